//! 应用层错误定义
//!
//! 统一的命令/查询错误类型，对应生成任务的错误分类:
//! 配置错误、参数校验错误、资源繁忙、执行错误

use thiserror::Error;

use crate::application::ports::{DispatchError, ModelError, TaskError};
use crate::domain::ParamsError;

/// 应用层错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 角色未启用或模型路径缺失
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 请求参数错误
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 租约在超时内未能获得
    #[error("Resource busy: {0}")]
    ResourceBusy(String),

    /// 生成过程失败
    #[error("Execution error: {0}")]
    Execution(String),

    /// 同 ID 任务仍在运行
    #[error("Task already in progress: {0}")]
    DuplicateTask(String),

    /// 任务不存在
    #[error("Task not found: {0}")]
    NotFound(String),

    /// 状态无效
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// 内部错误
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ApplicationError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }
}

impl From<TaskError> for ApplicationError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::Duplicate(id) => Self::DuplicateTask(id),
            TaskError::Unknown(id) => Self::NotFound(id),
        }
    }
}

impl From<DispatchError> for ApplicationError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Task(e) => e.into(),
            DispatchError::QueueFull => Self::ResourceBusy(err.to_string()),
            DispatchError::Closed => Self::InternalError(err.to_string()),
        }
    }
}

impl From<ParamsError> for ApplicationError {
    fn from(err: ParamsError) -> Self {
        Self::ValidationError(err.to_string())
    }
}

/// 加载失败归为配置错误，运行失败归为执行错误
impl From<ModelError> for ApplicationError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Unavailable { .. } => Self::Configuration(err.to_string()),
            ModelError::Execution(msg) => Self::Execution(msg),
            ModelError::Cancelled => Self::Execution("generation cancelled".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelRole;

    #[test]
    fn test_load_failure_maps_to_configuration() {
        let err: ApplicationError =
            ModelError::unavailable(ModelRole::VideoGenerator, "model path does not exist").into();
        assert!(matches!(err, ApplicationError::Configuration(_)));
        assert!(err.to_string().starts_with("Configuration error:"));
    }

    #[test]
    fn test_run_failure_maps_to_execution() {
        let err: ApplicationError = ModelError::execution("CUDA out of memory").into();
        assert_eq!(err.to_string(), "Execution error: CUDA out of memory");
    }

    #[test]
    fn test_task_errors_map() {
        let err: ApplicationError = TaskError::Duplicate("t1".to_string()).into();
        assert!(matches!(err, ApplicationError::DuplicateTask(_)));
        let err: ApplicationError = TaskError::Unknown("t1".to_string()).into();
        assert!(matches!(err, ApplicationError::NotFound(_)));
    }

    #[test]
    fn test_dispatch_errors_map() {
        let err: ApplicationError = DispatchError::QueueFull.into();
        assert!(matches!(err, ApplicationError::ResourceBusy(_)));
        let err: ApplicationError =
            DispatchError::Task(TaskError::Duplicate("t1".to_string())).into();
        assert!(matches!(err, ApplicationError::DuplicateTask(_)));
    }
}
