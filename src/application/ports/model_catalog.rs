//! Model Catalog Port - 模型配置查询
//!
//! 由配置层实现，编排器和 ModelHandle 通过它判断角色是否可用

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::ModelRole;

pub trait ModelCatalogPort: Send + Sync {
    /// 角色是否在配置中启用
    fn is_role_enabled(&self, role: ModelRole) -> bool;

    /// 角色的模型路径（未配置时为 None）
    fn model_path(&self, role: ModelRole) -> Option<PathBuf>;

    /// 单次生成的最长执行时间
    fn run_timeout(&self, role: ModelRole) -> Duration;
}
