//! Task Progress Handlers

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures_util::{Stream, StreamExt};
use std::sync::Arc;

use crate::application::{
    AcknowledgeTaskCommand, GetTaskProgress, StreamTaskProgress, TaskProgress,
};
use crate::infrastructure::http::dto::AcknowledgeResponse;
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 当前进度；未知任务返回 `{progress: 0, status: "unknown"}`
pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Json<TaskProgress> {
    Json(state.progress_publisher.poll(GetTaskProgress { task_id }))
}

/// 进度流（text/event-stream），终态事件之后关闭
pub async fn stream_progress(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    tracing::debug!(task_id = %task_id, "Progress stream opened");

    let events = state
        .progress_publisher
        .stream(StreamTaskProgress { task_id })
        .map(|progress| Event::default().json_data(&progress));

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// 确认终态任务，立即删除记录
pub async fn acknowledge_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<AcknowledgeResponse>, ApiError> {
    let result = state
        .acknowledge_task_handler
        .handle(AcknowledgeTaskCommand { task_id })?;

    Ok(Json(AcknowledgeResponse {
        task_id: result.task_id,
        removed: result.removed,
    }))
}
