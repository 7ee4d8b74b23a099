//! Generation Handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::application::SubmitGenerationCommand;
use crate::domain::ModelRole;
use crate::infrastructure::http::dto::{GenerateRequest, GenerateResponse};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 提交生成任务，立即返回 202
pub async fn submit_generation(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<GenerateResponse>), ApiError> {
    let Json(req) = payload?;

    let role = ModelRole::parse(&req.role)
        .ok_or_else(|| ApiError::Unprocessable(format!("Unknown model role: {}", req.role)))?;

    let cmd = SubmitGenerationCommand {
        task_id: req.task_id,
        role,
        params: req.params,
    };
    let result = state.submit_generation_handler.handle(cmd)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(GenerateResponse {
            task_id: result.task_id,
            status: result.status.as_str().to_string(),
        }),
    ))
}
