//! Event Publisher Implementation
//!
//! 按任务的广播通道，向 WebSocket 订阅者推送生命周期事件

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::domain::{Artifact, TaskRecord, TaskStatus};

const CHANNEL_CAPACITY: usize = 64;

/// 任务事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum TaskEvent {
    /// 任务状态或进度变更
    TaskStateChanged {
        task_id: String,
        status: TaskStatus,
        progress: u8,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<Artifact>,
    },
}

impl TaskEvent {
    pub fn from_record(record: &TaskRecord) -> Self {
        TaskEvent::TaskStateChanged {
            task_id: record.task_id().to_string(),
            status: record.status(),
            progress: record.progress(),
            message: record.message().map(str::to_string),
            error: record.error().map(str::to_string),
            result: record.result().cloned(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        match self {
            TaskEvent::TaskStateChanged { status, .. } => status.is_terminal(),
        }
    }
}

/// 事件发布器
pub struct EventPublisher {
    /// task_id -> broadcast sender
    task_channels: DashMap<String, broadcast::Sender<TaskEvent>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            task_channels: DashMap::new(),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 订阅任务事件（通道不存在时创建）
    pub fn subscribe(&self, task_id: &str) -> broadcast::Receiver<TaskEvent> {
        self.task_channels
            .entry(task_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// 没有订阅者时移除通道
    pub fn prune(&self, task_id: &str) {
        self.task_channels
            .remove_if(task_id, |_, sender| sender.receiver_count() == 0);
    }

    /// 当前有通道的任务数
    pub fn channel_count(&self) -> usize {
        self.task_channels.len()
    }

    /// 发布任务记录的当前快照
    ///
    /// 终态事件发出后关闭通道，订阅者读完缓冲后收到 Closed
    pub fn publish_task(&self, record: &TaskRecord) {
        let event = TaskEvent::from_record(record);
        let task_id = record.task_id();

        if let Some(sender) = self.task_channels.get(task_id) {
            if let Err(e) = sender.send(event) {
                tracing::debug!(
                    task_id = %task_id,
                    error = %e,
                    "Failed to publish event (no receivers)"
                );
            }
        }

        if record.is_terminal() {
            self.task_channels.remove(task_id);
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskUpdate;
    use tokio::sync::broadcast::error::RecvError;

    #[tokio::test]
    async fn test_subscriber_receives_until_terminal() {
        let publisher = EventPublisher::new();
        let mut rx = publisher.subscribe("t1");

        let mut record = TaskRecord::new("t1");
        record.apply(TaskUpdate::stage(TaskStatus::Initializing, 5));
        publisher.publish_task(&record);
        record.apply(TaskUpdate::failed("boom"));
        publisher.publish_task(&record);

        let first = rx.recv().await.unwrap();
        assert!(!first.is_terminal());
        let last = rx.recv().await.unwrap();
        assert!(last.is_terminal());
        assert!(matches!(rx.recv().await, Err(RecvError::Closed)));
        assert_eq!(publisher.channel_count(), 0);
    }

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let publisher = EventPublisher::new();
        publisher.publish_task(&TaskRecord::new("t1"));
        assert_eq!(publisher.channel_count(), 0);
    }

    #[test]
    fn test_prune_keeps_channels_with_subscribers() {
        let publisher = EventPublisher::new();
        let rx = publisher.subscribe("t1");
        publisher.prune("t1");
        assert_eq!(publisher.channel_count(), 1);

        drop(rx);
        publisher.prune("t1");
        assert_eq!(publisher.channel_count(), 0);
    }

    #[test]
    fn test_event_serialization() {
        let mut record = TaskRecord::new("t1");
        record.apply(TaskUpdate::processing(42, Some("step 3/7".to_string())));

        let json = serde_json::to_value(TaskEvent::from_record(&record)).unwrap();
        assert_eq!(json["event"], "TaskStateChanged");
        assert_eq!(json["data"]["status"], "processing");
        assert_eq!(json["data"]["progress"], 42);
        assert_eq!(json["data"]["message"], "step 3/7");
        assert!(json["data"].get("error").is_none());
    }
}
