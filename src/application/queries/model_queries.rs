//! Model Queries - 模型角色状态查询

/// 列出所有角色的配置与租约状态
#[derive(Debug, Clone, Default)]
pub struct GetModelStatus;
