//! Memory Layer - In-Memory State Management
//!
//! 实现 TaskRegistry 和 ResourceLeaseManager，管理生成任务和模型租约的内存状态

mod lease_manager;
mod task_registry;

pub use lease_manager::{LeaseError, ModelLease, ResourceLeaseManager};
pub use task_registry::InMemoryTaskRegistry;
