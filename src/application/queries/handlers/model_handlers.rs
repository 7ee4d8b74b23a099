//! Model Query Handlers

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::application::ports::{LeaseStatusPort, ModelCatalogPort};
use crate::application::queries::GetModelStatus;
use crate::domain::ModelRole;

/// 单个角色的状态
#[derive(Debug, Clone, Serialize)]
pub struct ModelRoleStatus {
    pub role: ModelRole,
    pub enabled: bool,
    pub path: Option<PathBuf>,
    pub run_timeout_secs: u64,
    pub leased_by: Option<String>,
    pub leased_since: Option<DateTime<Utc>>,
    pub lease_grants: u64,
}

/// 模型状态响应
#[derive(Debug, Clone, Serialize)]
pub struct ModelStatusResponse {
    pub models: Vec<ModelRoleStatus>,
    /// 全局驻留上限（None 表示未启用）
    pub global_capacity: Option<usize>,
}

/// GetModelStatus Handler
pub struct GetModelStatusHandler {
    catalog: Arc<dyn ModelCatalogPort>,
    leases: Arc<dyn LeaseStatusPort>,
}

impl GetModelStatusHandler {
    pub fn new(catalog: Arc<dyn ModelCatalogPort>, leases: Arc<dyn LeaseStatusPort>) -> Self {
        Self { catalog, leases }
    }

    pub fn handle(&self, _query: GetModelStatus) -> ModelStatusResponse {
        let models = ModelRole::ALL
            .into_iter()
            .map(|role| {
                let lease = self.leases.holder(role);
                ModelRoleStatus {
                    role,
                    enabled: self.catalog.is_role_enabled(role),
                    path: self.catalog.model_path(role),
                    run_timeout_secs: self.catalog.run_timeout(role).as_secs(),
                    leased_by: lease.as_ref().map(|l| l.holder.clone()),
                    leased_since: lease.map(|l| l.acquired_at),
                    lease_grants: self.leases.grants(role),
                }
            })
            .collect();

        ModelStatusResponse {
            models,
            global_capacity: self.leases.global_capacity(),
        }
    }
}
