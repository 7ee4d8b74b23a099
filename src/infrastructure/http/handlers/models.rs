//! Model Status Handler

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::application::{GetModelStatus, ModelStatusResponse};
use crate::infrastructure::http::dto::ApiResponse;
use crate::infrastructure::http::state::AppState;

/// 列出各角色的配置与租约状态
pub async fn list_models(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<ModelStatusResponse>> {
    Json(ApiResponse::success(
        state.model_status_handler.handle(GetModelStatus),
    ))
}
