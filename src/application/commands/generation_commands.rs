//! Generation Commands - 生成任务相关命令

use crate::domain::{ModelRole, TaskStatus};

/// 提交生成任务命令
///
/// `params` 保持原始 JSON，由处理器按角色解析校验
#[derive(Debug, Clone)]
pub struct SubmitGenerationCommand {
    pub task_id: Option<String>,
    pub role: ModelRole,
    pub params: serde_json::Value,
}

/// 提交生成任务响应
#[derive(Debug, Clone)]
pub struct SubmitGenerationResponse {
    pub task_id: String,
    pub status: TaskStatus,
}

/// 确认（删除）终态任务记录命令
#[derive(Debug, Clone)]
pub struct AcknowledgeTaskCommand {
    pub task_id: String,
}

/// 确认任务响应
#[derive(Debug, Clone)]
pub struct AcknowledgeTaskResponse {
    pub task_id: String,
    /// false 表示记录本就不存在
    pub removed: bool,
}
