//! Task Registry Port - 生成任务进度登记
//!
//! 定义任务记录存取的抽象接口，具体实现在 infrastructure/memory 层

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{TaskRecord, TaskUpdate};

/// Task Registry 错误
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Task already in progress: {0}")]
    Duplicate(String),

    #[error("Unknown task: {0}")]
    Unknown(String),
}

/// Task Registry Port
///
/// 任务进度的唯一数据源。所有方法都可被多个编排任务与读取方并发调用，
/// 临界区内不做任何 I/O。
pub trait TaskRegistryPort: Send + Sync {
    /// 创建新记录（Starting）
    ///
    /// 同 ID 的记录仍在运行时返回 `TaskError::Duplicate`；
    /// 已处于终态的旧记录会被新记录替换。
    fn create(&self, task_id: &str) -> Result<TaskRecord, TaskError>;

    /// 更新记录
    ///
    /// - `Ok(Some(record))`: 已应用，返回更新后的快照
    /// - `Ok(None)`: 记录已是终态，更新被忽略
    fn update(&self, task_id: &str, update: TaskUpdate) -> Result<Option<TaskRecord>, TaskError>;

    /// 获取记录快照
    fn get(&self, task_id: &str) -> Option<TaskRecord>;

    /// 删除记录（幂等）
    fn delete(&self, task_id: &str);

    /// 仅当记录仍存在、处于终态且创建时间一致时删除
    ///
    /// `created_at` 用于区分被重新提交的同 ID 任务
    fn remove_if_terminal(&self, task_id: &str, created_at: DateTime<Utc>) -> bool;
}
