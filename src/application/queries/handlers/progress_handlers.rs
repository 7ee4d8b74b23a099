//! Progress Query Handlers - TaskRegistry 的只读投影
//!
//! poll 返回当前快照；stream 按固定间隔采样，遇到终态发出一次后结束。

use futures_util::stream::{self, Stream};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::application::ports::TaskRegistryPort;
use crate::application::queries::{GetTaskProgress, StreamTaskProgress};
use crate::domain::{Artifact, TaskRecord};

const UNKNOWN_STATUS: &str = "unknown";

// ============================================================================
// Response DTOs
// ============================================================================

/// 进度快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskProgress {
    pub progress: u8,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Artifact>,
}

impl TaskProgress {
    /// 任务不存在（从未提交或已被清理）
    pub fn unknown() -> Self {
        Self {
            progress: 0,
            status: UNKNOWN_STATUS.to_string(),
            message: None,
            error: None,
            result: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.status == UNKNOWN_STATUS
    }

    /// 流在发出此快照后结束
    pub fn is_final(&self) -> bool {
        self.is_unknown() || self.status == "completed" || self.status == "failed"
    }
}

impl From<&TaskRecord> for TaskProgress {
    fn from(record: &TaskRecord) -> Self {
        Self {
            progress: record.progress(),
            status: record.status().as_str().to_string(),
            message: record.message().map(str::to_string),
            error: record.error().map(str::to_string),
            result: record.result().cloned(),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum StreamState {
    Start,
    Waiting,
    Done,
}

/// Progress Publisher
pub struct ProgressPublisher {
    registry: Arc<dyn TaskRegistryPort>,
    interval: Duration,
}

impl ProgressPublisher {
    pub fn new(registry: Arc<dyn TaskRegistryPort>, interval: Duration) -> Self {
        Self { registry, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 当前快照；任务不存在时返回 `{0, "unknown"}`
    pub fn poll(&self, query: GetTaskProgress) -> TaskProgress {
        snapshot(self.registry.as_ref(), &query.task_id)
    }

    /// 进度流
    ///
    /// 立即发出当前快照，之后每个间隔采样一次；终态或未知状态发出一次后结束。
    /// 每次调用都从当前状态重新开始。
    pub fn stream(&self, query: StreamTaskProgress) -> impl Stream<Item = TaskProgress> + Send + 'static {
        let registry = self.registry.clone();
        let interval = self.interval;
        let task_id = query.task_id;

        stream::unfold(StreamState::Start, move |state| {
            let registry = registry.clone();
            let task_id = task_id.clone();
            async move {
                match state {
                    StreamState::Done => return None,
                    StreamState::Waiting => tokio::time::sleep(interval).await,
                    StreamState::Start => {}
                }

                let progress = snapshot(registry.as_ref(), &task_id);
                let next = if progress.is_final() {
                    tracing::debug!(task_id = %task_id, status = %progress.status, "Progress stream finished");
                    StreamState::Done
                } else {
                    StreamState::Waiting
                };
                Some((progress, next))
            }
        })
    }
}

fn snapshot(registry: &dyn TaskRegistryPort, task_id: &str) -> TaskProgress {
    registry
        .get(task_id)
        .map(|record| TaskProgress::from(&record))
        .unwrap_or_else(TaskProgress::unknown)
}
