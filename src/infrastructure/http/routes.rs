//! HTTP Routes
//!
//! API Endpoints:
//! - /generate                          POST    提交生成任务（202，后台执行）
//! - /task/progress/{task_id}           GET     查询任务进度
//! - /task/progress/{task_id}           DELETE  确认并删除终态任务记录
//! - /task/progress/{task_id}/stream    GET     进度流（text/event-stream）
//! - /ws/task/{task_id}                 WS      任务生命周期事件
//! - /api/models                        GET     模型角色配置与租约状态
//! - /api/ping                          GET     健康检查

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/generate", post(handlers::submit_generation))
        .nest("/task", task_routes())
        .nest("/api", api_routes())
        .route("/ws/task/:task_id", get(handlers::task_websocket_handler))
}

/// 任务进度路由
fn task_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/progress/:task_id",
            get(handlers::get_progress).delete(handlers::acknowledge_task),
        )
        .route("/progress/:task_id/stream", get(handlers::stream_progress))
}

/// 管理类路由
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(handlers::ping))
        .route("/models", get(handlers::list_models))
}
