//! Domain Layer - 领域层
//!
//! 包含两个限界上下文:
//! - Task Context: 生成任务的进度与终态
//! - Generation Context: 模型角色与各角色的生成参数

pub mod generation;
pub mod task;

pub use generation::{GenerationParams, ModelRole, ParamsError};
pub use task::{Artifact, TaskRecord, TaskStatus, TaskUpdate};
