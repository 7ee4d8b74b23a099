//! Task Context - Aggregate Root

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Artifact, TaskStatus};

/// 任务记录聚合根
///
/// 不变量:
/// - 非终态时 progress 单调不减，取值 0..=100
/// - 进入 Completed/Failed 后不再接受任何更新
/// - error 仅在 Failed 时存在，result 仅在 Completed 时存在
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRecord {
    task_id: String,
    progress: u8,
    status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Artifact>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TaskRecord {
    /// 创建新记录（Starting, 0%）
    pub fn new(task_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            task_id: task_id.into(),
            progress: 0,
            status: TaskStatus::Starting,
            message: None,
            error: None,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn result(&self) -> Option<&Artifact> {
        self.result.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// 应用一次更新
    ///
    /// 返回 `false` 表示记录已处于终态，更新被忽略。
    /// 进度与状态都只前进不后退：迟到的较小进度值不会覆盖已记录的值。
    pub fn apply(&mut self, update: TaskUpdate) -> bool {
        if self.is_terminal() {
            return false;
        }

        let status = if stage_rank(update.status) >= stage_rank(self.status) {
            update.status
        } else {
            self.status
        };
        let status_changed = status != self.status;

        let requested = match status {
            TaskStatus::Completed => 100,
            _ => update.progress.min(100),
        };
        self.progress = self.progress.max(requested);
        self.status = status;

        if update.message.is_some() || status_changed {
            self.message = update.message;
        }

        match status {
            TaskStatus::Failed => {
                self.error = Some(
                    update
                        .error
                        .unwrap_or_else(|| "generation failed".to_string()),
                );
            }
            TaskStatus::Completed => {
                self.result = Some(update.result.unwrap_or_default());
            }
            _ => {}
        }

        self.updated_at = Utc::now();
        true
    }
}

fn stage_rank(status: TaskStatus) -> u8 {
    match status {
        TaskStatus::Starting => 0,
        TaskStatus::Initializing => 1,
        TaskStatus::Processing => 2,
        TaskStatus::Completed | TaskStatus::Failed => 3,
    }
}

/// 任务更新
///
/// 通过构造函数创建，保证 error/result 只出现在对应的终态上
#[derive(Debug, Clone, PartialEq)]
pub struct TaskUpdate {
    pub status: TaskStatus,
    pub progress: u8,
    pub message: Option<String>,
    pub error: Option<String>,
    pub result: Option<Artifact>,
}

impl TaskUpdate {
    /// 阶段切换（Initializing / Processing）
    pub fn stage(status: TaskStatus, progress: u8) -> Self {
        Self {
            status,
            progress,
            message: None,
            error: None,
            result: None,
        }
    }

    /// 生成过程中的进度上报
    pub fn processing(progress: u8, message: Option<String>) -> Self {
        Self {
            status: TaskStatus::Processing,
            progress,
            message,
            error: None,
            result: None,
        }
    }

    pub fn completed(result: Artifact) -> Self {
        Self {
            status: TaskStatus::Completed,
            progress: 100,
            message: None,
            error: None,
            result: Some(result),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Failed,
            progress: 0,
            message: None,
            error: Some(error.into()),
            result: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_new_record_is_starting() {
        let record = TaskRecord::new("t1");
        assert_eq!(record.task_id(), "t1");
        assert_eq!(record.status(), TaskStatus::Starting);
        assert_eq!(record.progress(), 0);
        assert!(record.error().is_none());
        assert!(record.result().is_none());
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut record = TaskRecord::new("t1");
        assert!(record.apply(TaskUpdate::processing(40, None)));
        assert!(record.apply(TaskUpdate::processing(25, None)));
        assert_eq!(record.progress(), 40);
    }

    #[test]
    fn test_status_does_not_regress() {
        let mut record = TaskRecord::new("t1");
        record.apply(TaskUpdate::stage(TaskStatus::Processing, 10));
        record.apply(TaskUpdate::stage(TaskStatus::Initializing, 5));
        assert_eq!(record.status(), TaskStatus::Processing);
        assert_eq!(record.progress(), 10);
    }

    #[test]
    fn test_terminal_record_ignores_updates() {
        let mut record = TaskRecord::new("t1");
        let artifact = Artifact::from_files(vec![PathBuf::from("out/a.png")]);
        assert!(record.apply(TaskUpdate::completed(artifact.clone())));
        assert_eq!(record.progress(), 100);

        assert!(!record.apply(TaskUpdate::processing(50, None)));
        assert!(!record.apply(TaskUpdate::failed("late")));
        assert_eq!(record.status(), TaskStatus::Completed);
        assert_eq!(record.result(), Some(&artifact));
        assert!(record.error().is_none());
    }

    #[test]
    fn test_failure_keeps_last_progress() {
        let mut record = TaskRecord::new("t1");
        record.apply(TaskUpdate::processing(60, None));
        record.apply(TaskUpdate::failed("out of memory"));
        assert_eq!(record.status(), TaskStatus::Failed);
        assert_eq!(record.progress(), 60);
        assert_eq!(record.error(), Some("out of memory"));
        assert!(record.result().is_none());
    }

    #[test]
    fn test_progress_is_capped_at_100() {
        let mut record = TaskRecord::new("t1");
        record.apply(TaskUpdate::processing(250, None));
        assert_eq!(record.progress(), 100);
        assert_eq!(record.status(), TaskStatus::Processing);
    }

    #[test]
    fn test_message_cleared_on_stage_change() {
        let mut record = TaskRecord::new("t1");
        record.apply(TaskUpdate::processing(20, Some("step 1/4".to_string())));
        assert_eq!(record.message(), Some("step 1/4"));
        record.apply(TaskUpdate::processing(30, None));
        assert_eq!(record.message(), Some("step 1/4"));
        record.apply(TaskUpdate::completed(Artifact::default()));
        assert_eq!(record.message(), None);
    }
}
