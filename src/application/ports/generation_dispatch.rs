//! Generation Dispatch Port - 提交生成任务
//!
//! 应用层通过它把已校验的请求交给后台编排执行，提交本身立即返回

use thiserror::Error;

use crate::application::ports::{GenerationRequest, TaskError};
use crate::domain::TaskRecord;

/// 调度错误
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Task(#[from] TaskError),

    /// 待调度队列已满
    #[error("Generation queue is full")]
    QueueFull,

    /// 后台 worker 已停止
    #[error("Generation worker is not running")]
    Closed,
}

pub trait GenerationDispatchPort: Send + Sync {
    /// 创建 Starting 记录并排入后台执行
    fn submit(&self, request: GenerationRequest) -> Result<TaskRecord, DispatchError>;
}
