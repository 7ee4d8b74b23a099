//! Task Context - 生成任务限界上下文
//!
//! 职责:
//! - 任务进度记录（TaskRecord）
//! - 状态机: Starting → Initializing → Processing → {Completed | Failed}
//! - 终态不可变

mod aggregate;
mod value_objects;

pub use aggregate::{TaskRecord, TaskUpdate};
pub use value_objects::{Artifact, TaskStatus};
