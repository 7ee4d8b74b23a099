//! Ping Handler
//!
//! 健康检查，顺带给出已启用角色和当前被租用的角色

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::application::GetModelStatus;
use crate::domain::ModelRole;
use crate::infrastructure::http::state::AppState;

/// Ping 响应
#[derive(Serialize)]
pub struct PingResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub enabled_roles: Vec<ModelRole>,
    /// 正在执行任务的角色
    pub busy_roles: Vec<ModelRole>,
}

/// Ping endpoint - 健康检查
///
/// 没有任何启用的角色时返回 `degraded`，服务仍可查询但无法接收生成任务
pub async fn ping(State(state): State<Arc<AppState>>) -> Json<PingResponse> {
    let snapshot = state.model_status_handler.handle(GetModelStatus);

    let enabled_roles: Vec<ModelRole> = snapshot
        .models
        .iter()
        .filter(|m| m.enabled)
        .map(|m| m.role)
        .collect();
    let busy_roles = snapshot
        .models
        .iter()
        .filter(|m| m.leased_by.is_some())
        .map(|m| m.role)
        .collect();

    Json(PingResponse {
        status: if enabled_roles.is_empty() { "degraded" } else { "ok" },
        version: env!("CARGO_PKG_VERSION"),
        enabled_roles,
        busy_roles,
    })
}
