//! Cleanup Scheduler - 终态任务记录的延迟清理
//!
//! 所有待清理的记录放在同一个 DelayQueue 里，由单个后台任务处理，
//! 不为每个任务单独起定时器。

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::time::DelayQueue;

use crate::application::ports::TaskRegistryPort;
use crate::config::MAX_RETENTION_SECS;

#[derive(Debug)]
struct CleanupRequest {
    task_id: String,
    created_at: DateTime<Utc>,
    delay: Duration,
}

#[derive(Debug)]
struct PendingCleanup {
    task_id: String,
    created_at: DateTime<Utc>,
}

/// 清理调度句柄
#[derive(Clone)]
pub struct CleanupScheduler {
    sender: mpsc::UnboundedSender<CleanupRequest>,
    registry: Arc<dyn TaskRegistryPort>,
}

impl CleanupScheduler {
    /// 创建调度句柄和对应的后台 worker
    pub fn new(registry: Arc<dyn TaskRegistryPort>) -> (Self, CleanupWorker) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = CleanupWorker {
            receiver,
            registry: registry.clone(),
        };
        (Self { sender, registry }, worker)
    }

    /// 在 `delay` 之后删除任务记录
    ///
    /// 记录当前的 `created_at`：到期时只有同一次提交的终态记录会被删除，
    /// 同 ID 的新提交不受影响。
    pub fn schedule(&self, task_id: &str, delay: Duration) {
        let Some(record) = self.registry.get(task_id) else {
            tracing::debug!(task_id = %task_id, "Nothing to clean up");
            return;
        };

        // DelayQueue 对超出计时范围的延迟会 panic
        let ceiling = Duration::from_secs(MAX_RETENTION_SECS);
        let delay = if delay > ceiling {
            tracing::warn!(
                task_id = %task_id,
                delay_secs = delay.as_secs(),
                max_secs = MAX_RETENTION_SECS,
                "Cleanup delay clamped"
            );
            ceiling
        } else {
            delay
        };

        let request = CleanupRequest {
            task_id: task_id.to_string(),
            created_at: record.created_at(),
            delay,
        };
        if self.sender.send(request).is_err() {
            tracing::warn!(task_id = %task_id, "Cleanup worker stopped, record will not expire");
            return;
        }

        tracing::debug!(
            task_id = %task_id,
            delay_secs = delay.as_secs(),
            "Task cleanup scheduled"
        );
    }
}

/// 清理 worker
pub struct CleanupWorker {
    receiver: mpsc::UnboundedReceiver<CleanupRequest>,
    registry: Arc<dyn TaskRegistryPort>,
}

impl CleanupWorker {
    /// 启动清理循环，所有调度句柄都被 drop 后退出
    pub async fn run(mut self) {
        tracing::info!("CleanupScheduler started");

        let mut queue: DelayQueue<PendingCleanup> = DelayQueue::new();

        loop {
            tokio::select! {
                request = self.receiver.recv() => {
                    let Some(request) = request else { break };
                    queue.insert(
                        PendingCleanup {
                            task_id: request.task_id,
                            created_at: request.created_at,
                        },
                        request.delay,
                    );
                }
                Some(expired) = queue.next(), if !queue.is_empty() => {
                    self.expire(expired.into_inner());
                }
            }
        }

        tracing::info!(pending = queue.len(), "CleanupScheduler stopped");
    }

    fn expire(&self, pending: PendingCleanup) {
        if self
            .registry
            .remove_if_terminal(&pending.task_id, pending.created_at)
        {
            tracing::info!(task_id = %pending.task_id, "Expired task record removed");
        } else {
            tracing::debug!(
                task_id = %pending.task_id,
                "Task record already gone, resubmitted, or still running; cleanup skipped"
            );
        }
    }
}
