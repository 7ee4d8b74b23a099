//! WebSocket Handler - 任务事件推送

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::infrastructure::events::TaskEvent;
use crate::infrastructure::http::state::AppState;

/// 任务 WebSocket 连接处理
pub async fn task_websocket_handler(
    ws: WebSocketUpgrade,
    Path(task_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_task_socket(socket, task_id, state))
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &TaskEvent,
) -> Result<(), axum::Error> {
    match serde_json::to_string(event) {
        Ok(json) => sender.send(Message::Text(json)).await,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize event");
            Ok(())
        }
    }
}

async fn handle_task_socket(socket: WebSocket, task_id: String, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // 先订阅再读快照，两者之间发生的事件不会丢
    let mut event_rx = state.event_publisher.subscribe(&task_id);

    let Some(record) = state.registry.get(&task_id) else {
        tracing::warn!(task_id = %task_id, "WebSocket connection rejected: unknown task");
        drop(event_rx);
        state.event_publisher.prune(&task_id);
        let _ = sender.close().await;
        return;
    };

    tracing::info!(task_id = %task_id, "WebSocket connected");

    let snapshot = TaskEvent::from_record(&record);
    if send_event(&mut sender, &snapshot).await.is_err() || snapshot.is_terminal() {
        drop(event_rx);
        state.event_publisher.prune(&task_id);
        let _ = sender.close().await;
        return;
    }

    // 事件转发任务
    let task_id_for_forward = task_id.clone();
    let mut forward_task = tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(event) => {
                    if let Err(e) = send_event(&mut sender, &event).await {
                        tracing::debug!(
                            task_id = %task_id_for_forward,
                            error = %e,
                            "Failed to send WebSocket message"
                        );
                        break;
                    }
                    if event.is_terminal() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(task_id = %task_id_for_forward, skipped = skipped, "WebSocket subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
        let _ = sender.close().await;
    });

    // 接收客户端消息（心跳）
    let task_id_for_receive = task_id.clone();
    let mut receive_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => {
                    tracing::info!(task_id = %task_id_for_receive, "WebSocket closed by client");
                    break;
                }
                Err(e) => {
                    tracing::debug!(task_id = %task_id_for_receive, error = %e, "WebSocket error");
                    break;
                }
                _ => {}
            }
        }
    });

    // 等待任一任务完成
    tokio::select! {
        _ = &mut forward_task => receive_task.abort(),
        _ = &mut receive_task => forward_task.abort(),
    }

    state.event_publisher.prune(&task_id);
    tracing::info!(task_id = %task_id, "WebSocket disconnected");
}
