//! Lease Status Port - 模型租约只读视图

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::ModelRole;

/// 当前租约信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaseInfo {
    pub role: ModelRole,
    pub holder: String,
    pub acquired_at: DateTime<Utc>,
}

impl LeaseInfo {
    /// 已持有时长（秒）
    pub fn held_secs(&self) -> i64 {
        (Utc::now() - self.acquired_at).num_seconds()
    }
}

pub trait LeaseStatusPort: Send + Sync {
    /// 角色当前的租约持有者
    fn holder(&self, role: ModelRole) -> Option<LeaseInfo>;

    /// 角色累计授予的租约次数
    fn grants(&self, role: ModelRole) -> u64;

    /// 全局驻留上限（None 表示未启用）
    fn global_capacity(&self) -> Option<usize>;
}
