//! In-Memory Task Registry Implementation

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use crate::application::ports::{TaskError, TaskRegistryPort};
use crate::domain::{TaskRecord, TaskUpdate};

/// 内存任务登记表
///
/// DashMap 分片锁，单条记录的读写都是短临界区
pub struct InMemoryTaskRegistry {
    /// task_id -> TaskRecord
    tasks: DashMap<String, TaskRecord>,
}

impl InMemoryTaskRegistry {
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl Default for InMemoryTaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRegistryPort for InMemoryTaskRegistry {
    fn create(&self, task_id: &str) -> Result<TaskRecord, TaskError> {
        let record = TaskRecord::new(task_id);

        let replaced = match self.tasks.entry(task_id.to_string()) {
            Entry::Occupied(mut entry) => {
                if !entry.get().is_terminal() {
                    return Err(TaskError::Duplicate(task_id.to_string()));
                }
                entry.insert(record.clone());
                true
            }
            Entry::Vacant(entry) => {
                entry.insert(record.clone());
                false
            }
        };

        tracing::debug!(task_id = %task_id, replaced = replaced, "Task record created");
        Ok(record)
    }

    fn update(&self, task_id: &str, update: TaskUpdate) -> Result<Option<TaskRecord>, TaskError> {
        let status = update.status;
        let (applied, snapshot) = {
            let mut record = self
                .tasks
                .get_mut(task_id)
                .ok_or_else(|| TaskError::Unknown(task_id.to_string()))?;
            let applied = record.apply(update);
            (applied, record.clone())
        };

        if !applied {
            tracing::warn!(
                task_id = %task_id,
                current = %snapshot.status(),
                requested = %status,
                "Ignoring update for terminal task"
            );
            return Ok(None);
        }

        tracing::trace!(
            task_id = %task_id,
            status = %snapshot.status(),
            progress = snapshot.progress(),
            "Task record updated"
        );
        Ok(Some(snapshot))
    }

    fn get(&self, task_id: &str) -> Option<TaskRecord> {
        self.tasks.get(task_id).map(|r| r.clone())
    }

    fn delete(&self, task_id: &str) {
        if self.tasks.remove(task_id).is_some() {
            tracing::debug!(task_id = %task_id, "Task record deleted");
        }
    }

    fn remove_if_terminal(&self, task_id: &str, created_at: DateTime<Utc>) -> bool {
        self.tasks
            .remove_if(task_id, |_, record| {
                record.is_terminal() && record.created_at() == created_at
            })
            .is_some()
    }
}
