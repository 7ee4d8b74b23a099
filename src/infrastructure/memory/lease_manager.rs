//! Resource Lease Manager
//!
//! 每个模型角色一个单许可的公平信号量，保证同一角色同一时刻只有一次
//! load/run 在进行；可选的全局信号量限制同时驻留显存的角色数量。
//!
//! 获取顺序固定为先全局、后角色。

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

use crate::application::ports::{LeaseInfo, LeaseStatusPort};
use crate::domain::ModelRole;

/// 租约错误
#[derive(Debug, Error)]
pub enum LeaseError {
    #[error("{role} is busy: lease not acquired within {}s", waited.as_secs_f32())]
    ResourceBusy { role: ModelRole, waited: Duration },

    #[error("Lease manager closed")]
    Closed,
}

/// 正在生效的租约，持有信号量许可直到释放
struct ActiveLease {
    info: LeaseInfo,
    _role_permit: OwnedSemaphorePermit,
    _global_permit: Option<OwnedSemaphorePermit>,
}

struct RoleSlot {
    semaphore: Arc<Semaphore>,
    active: Mutex<Option<ActiveLease>>,
    grants: AtomicU64,
}

impl RoleSlot {
    fn new() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(1)),
            active: Mutex::new(None),
            grants: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<ActiveLease>> {
        // 临界区内没有会 panic 的逻辑，中毒时直接取回数据
        match self.active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// 资源租约管理器
pub struct ResourceLeaseManager {
    slots: HashMap<ModelRole, RoleSlot>,
    global: Option<Arc<Semaphore>>,
    global_capacity: usize,
}

impl ResourceLeaseManager {
    /// 创建租约管理器
    ///
    /// `global_capacity` 为 0 时不启用全局上限
    pub fn new(global_capacity: usize) -> Self {
        let slots = ModelRole::ALL
            .into_iter()
            .map(|role| (role, RoleSlot::new()))
            .collect();
        let global = (global_capacity > 0).then(|| Arc::new(Semaphore::new(global_capacity)));

        tracing::debug!(global_capacity = global_capacity, "ResourceLeaseManager created");
        Self {
            slots,
            global,
            global_capacity,
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn slot(&self, role: ModelRole) -> &RoleSlot {
        // slots 在构造时覆盖了全部角色
        &self.slots[&role]
    }

    /// 获取角色租约
    ///
    /// 在 `timeout` 内等待（不持有任何锁），按到达顺序授予。
    /// 超时返回 `LeaseError::ResourceBusy`，期间拿到的全局许可会随之归还。
    pub async fn acquire(
        self: &Arc<Self>,
        role: ModelRole,
        task_id: &str,
        timeout: Duration,
    ) -> Result<ModelLease, LeaseError> {
        let started = Instant::now();
        let deadline = started + timeout;
        let busy = || LeaseError::ResourceBusy {
            role,
            waited: started.elapsed(),
        };

        tracing::debug!(task_id = %task_id, role = %role, "Waiting for model lease");

        let global_permit = match &self.global {
            Some(global) => {
                let permit = tokio::time::timeout_at(deadline, global.clone().acquire_owned())
                    .await
                    .map_err(|_| busy())?
                    .map_err(|_| LeaseError::Closed)?;
                Some(permit)
            }
            None => None,
        };

        let slot = self.slot(role);
        let role_permit = tokio::time::timeout_at(deadline, slot.semaphore.clone().acquire_owned())
            .await
            .map_err(|_| busy())?
            .map_err(|_| LeaseError::Closed)?;

        let info = LeaseInfo {
            role,
            holder: task_id.to_string(),
            acquired_at: Utc::now(),
        };

        let previous = slot.lock().replace(ActiveLease {
            info: info.clone(),
            _role_permit: role_permit,
            _global_permit: global_permit,
        });
        slot.grants.fetch_add(1, Ordering::Relaxed);

        if let Some(previous) = previous {
            // 许可保证不会走到这里
            tracing::error!(
                role = %role,
                previous_holder = %previous.info.holder,
                "Lease slot was occupied while its permit was free"
            );
        }

        tracing::info!(
            task_id = %task_id,
            role = %role,
            waited_ms = started.elapsed().as_millis() as u64,
            "Model lease acquired"
        );

        Ok(ModelLease {
            manager: Arc::clone(self),
            role,
            holder: info.holder,
            acquired_at: info.acquired_at,
            released: false,
        })
    }

    /// 释放租约
    ///
    /// 只有当前持有者可以释放；不匹配或重复释放不做任何事，只记录警告。
    /// 返回是否真正释放。
    pub fn release(&self, role: ModelRole, task_id: &str) -> bool {
        let slot = self.slot(role);
        let (released, current_holder) = {
            let mut active = slot.lock();
            match active.as_ref() {
                Some(lease) if lease.info.holder == task_id => (active.take(), None),
                Some(lease) => (None, Some(lease.info.holder.clone())),
                None => (None, None),
            }
        };

        match released {
            Some(lease) => {
                let held_ms = (Utc::now() - lease.info.acquired_at).num_milliseconds();
                drop(lease);
                tracing::info!(
                    task_id = %task_id,
                    role = %role,
                    held_ms = held_ms,
                    "Model lease released"
                );
                true
            }
            None => {
                tracing::warn!(
                    task_id = %task_id,
                    role = %role,
                    current_holder = ?current_holder,
                    "Ignoring release of a lease not held by caller"
                );
                false
            }
        }
    }
}

impl LeaseStatusPort for ResourceLeaseManager {
    fn holder(&self, role: ModelRole) -> Option<LeaseInfo> {
        self.slot(role).lock().as_ref().map(|lease| lease.info.clone())
    }

    fn grants(&self, role: ModelRole) -> u64 {
        self.slot(role).grants.load(Ordering::Relaxed)
    }

    fn global_capacity(&self) -> Option<usize> {
        self.global.as_ref().map(|_| self.global_capacity)
    }
}

/// 模型租约
///
/// 显式 `release()` 或 drop 时归还，保证任何退出路径都会释放
pub struct ModelLease {
    manager: Arc<ResourceLeaseManager>,
    role: ModelRole,
    holder: String,
    acquired_at: DateTime<Utc>,
    released: bool,
}

impl ModelLease {
    pub fn role(&self) -> ModelRole {
        self.role
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    pub fn release(mut self) {
        self.released = true;
        self.manager.release(self.role, &self.holder);
    }
}

impl Drop for ModelLease {
    fn drop(&mut self) {
        if !self.released {
            self.manager.release(self.role, &self.holder);
        }
    }
}

impl std::fmt::Debug for ModelLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelLease")
            .field("role", &self.role)
            .field("holder", &self.holder)
            .field("acquired_at", &self.acquired_at)
            .finish()
    }
}
