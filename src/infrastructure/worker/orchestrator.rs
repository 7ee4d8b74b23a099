//! Generation Orchestrator - 生成任务的端到端编排
//!
//! 提交端只创建 Starting 记录并入队，立即返回；后台 worker 为每个请求
//! 起一个异步任务，依次完成：
//! 获取租约 → 加载模型 → 生成（转发进度）→ 写终态 → 卸载 → 释放租约 → 安排清理。
//!
//! load / run / unload 都是阻塞调用，放在 spawn_blocking 中执行。

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::application::error::ApplicationError;
use crate::application::ports::{
    DispatchError, GenerationDispatchPort, GenerationRequest, ModelCatalogPort, ModelHandle,
    ModelHandleFactory, ProgressReport, ProgressReporter, TaskError, TaskRegistryPort,
    RUN_PROGRESS_START,
};
use crate::config::AppConfig;
use crate::domain::{Artifact, ModelRole, TaskRecord, TaskStatus, TaskUpdate};
use crate::infrastructure::events::EventPublisher;
use crate::infrastructure::memory::{LeaseError, ResourceLeaseManager};
use crate::infrastructure::worker::CleanupScheduler;

const INITIALIZING_PROGRESS: u8 = 5;

/// 编排配置
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// 等待租约的最长时间
    pub acquire_timeout: Duration,
    /// 成功任务记录保留时长
    pub completed_retention: Duration,
    /// 失败任务记录保留时长
    pub failed_retention: Duration,
    /// 待调度队列容量
    pub queue_capacity: usize,
}

impl OrchestratorConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            acquire_timeout: Duration::from_secs(config.lease.acquire_timeout_secs),
            completed_retention: Duration::from_secs(config.cleanup.completed_delay_secs),
            failed_retention: Duration::from_secs(config.cleanup.failed_delay_secs),
            queue_capacity: config.worker.queue_capacity,
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from_app_config(&AppConfig::default())
    }
}

/// 编排所需的协作者
#[derive(Clone)]
pub struct OrchestratorDeps {
    pub registry: Arc<dyn TaskRegistryPort>,
    pub leases: Arc<ResourceLeaseManager>,
    pub catalog: Arc<dyn ModelCatalogPort>,
    pub handles: Arc<dyn ModelHandleFactory>,
    pub publisher: Arc<EventPublisher>,
    pub cleanup: CleanupScheduler,
}

/// 生成编排器（提交端）
pub struct GenerationOrchestrator {
    sender: mpsc::Sender<GenerationRequest>,
    context: RunContext,
}

impl GenerationOrchestrator {
    /// 创建编排器和对应的后台 worker
    pub fn new(config: OrchestratorConfig, deps: OrchestratorDeps) -> (Self, GenerationWorker) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let context = RunContext {
            config: Arc::new(config),
            deps,
        };
        let worker = GenerationWorker {
            receiver,
            context: context.clone(),
        };
        (Self { sender, context }, worker)
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl GenerationDispatchPort for GenerationOrchestrator {
    fn submit(&self, request: GenerationRequest) -> Result<TaskRecord, DispatchError> {
        let role = request.params.role();
        let record = self.context.deps.registry.create(&request.task_id)?;
        self.context.deps.publisher.publish_task(&record);

        match self.sender.try_send(request) {
            Ok(()) => {
                tracing::info!(task_id = %record.task_id(), role = %role, "Generation task submitted");
                Ok(record)
            }
            Err(TrySendError::Full(request)) => {
                tracing::warn!(task_id = %request.task_id, role = %role, "Generation queue is full");
                let err = ApplicationError::ResourceBusy("generation queue is full".to_string());
                self.context.fail(&request.task_id, &err);
                self.context.schedule_cleanup(&request.task_id);
                Err(DispatchError::QueueFull)
            }
            Err(TrySendError::Closed(request)) => {
                tracing::error!(task_id = %request.task_id, "Generation worker is not running");
                let err = ApplicationError::internal("generation worker is not running");
                self.context.fail(&request.task_id, &err);
                self.context.schedule_cleanup(&request.task_id);
                Err(DispatchError::Closed)
            }
        }
    }
}

/// 生成 worker
///
/// 每个请求一个异步任务；同角色的任务在租约上排队
pub struct GenerationWorker {
    receiver: mpsc::Receiver<GenerationRequest>,
    context: RunContext,
}

impl GenerationWorker {
    /// 启动 Worker
    ///
    /// 提交端全部 drop 后停止接收，等待进行中的任务完成卸载再退出
    pub async fn run(mut self) {
        tracing::info!("GenerationWorker started");

        let mut in_flight = JoinSet::new();
        loop {
            tokio::select! {
                request = self.receiver.recv() => {
                    let Some(request) = request else { break };
                    in_flight.spawn(self.context.clone().execute(request));
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "Generation task aborted");
                    }
                }
            }
        }

        tracing::info!(in_flight = in_flight.len(), "GenerationWorker draining");
        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Generation task aborted");
            }
        }
        tracing::info!("GenerationWorker stopped");
    }
}

/// 单次运行共享的上下文
#[derive(Clone)]
struct RunContext {
    config: Arc<OrchestratorConfig>,
    deps: OrchestratorDeps,
}

impl RunContext {
    /// 写入注册表并发布事件
    fn transition(&self, task_id: &str, update: TaskUpdate) -> Option<TaskRecord> {
        match self.deps.registry.update(task_id, update) {
            Ok(Some(record)) => {
                self.deps.publisher.publish_task(&record);
                Some(record)
            }
            Ok(None) => None,
            Err(TaskError::Unknown(_)) => {
                tracing::debug!(task_id = %task_id, "Task record acknowledged before run finished");
                None
            }
            Err(e) => {
                tracing::error!(task_id = %task_id, error = %e, "Failed to update task record");
                None
            }
        }
    }

    fn fail(&self, task_id: &str, err: &ApplicationError) {
        tracing::error!(task_id = %task_id, error = %err, "Generation task failed");
        self.transition(task_id, TaskUpdate::failed(err.to_string()));
    }

    /// 记录仍属于本次提交且尚未结束
    ///
    /// 超时路径会提前写入 Failed；同 ID 重新提交后旧运行不再写入
    fn is_open(&self, task_id: &str, created_at: DateTime<Utc>) -> bool {
        self.deps
            .registry
            .get(task_id)
            .map(|record| record.created_at() == created_at && !record.is_terminal())
            .unwrap_or(false)
    }

    fn is_current(&self, task_id: &str, created_at: DateTime<Utc>) -> bool {
        self.deps
            .registry
            .get(task_id)
            .map(|record| record.created_at() == created_at)
            .unwrap_or(false)
    }

    fn schedule_cleanup(&self, task_id: &str) {
        let delay = match self.deps.registry.get(task_id).map(|r| r.status()) {
            Some(TaskStatus::Completed) => self.config.completed_retention,
            Some(_) => self.config.failed_retention,
            None => return,
        };
        self.deps.cleanup.schedule(task_id, delay);
    }

    /// 租约前的配置检查：不满足时不获取租约
    fn check_configured(&self, role: ModelRole) -> Result<(), ApplicationError> {
        if !self.deps.catalog.is_role_enabled(role) {
            return Err(ApplicationError::configuration(format!("{} is disabled", role)));
        }
        if self.deps.catalog.model_path(role).is_none() {
            return Err(ApplicationError::configuration(format!(
                "{} has no model path configured",
                role
            )));
        }
        Ok(())
    }

    async fn execute(self, request: GenerationRequest) {
        let task_id = request.task_id.clone();
        let role = request.params.role();
        let started = Instant::now();
        let Some(created_at) = self.deps.registry.get(&task_id).map(|r| r.created_at()) else {
            tracing::debug!(task_id = %task_id, "Task record gone before execution");
            return;
        };

        if let Err(err) = self.check_configured(role) {
            self.fail(&task_id, &err);
            self.schedule_cleanup(&task_id);
            return;
        }

        let lease = match self
            .deps
            .leases
            .acquire(role, &task_id, self.config.acquire_timeout)
            .await
        {
            Ok(lease) => lease,
            Err(e) => {
                let err = match e {
                    LeaseError::ResourceBusy { .. } => ApplicationError::ResourceBusy(e.to_string()),
                    LeaseError::Closed => ApplicationError::internal(e.to_string()),
                };
                self.fail(&task_id, &err);
                self.schedule_cleanup(&task_id);
                return;
            }
        };

        self.transition(
            &task_id,
            TaskUpdate::stage(TaskStatus::Initializing, INITIALIZING_PROGRESS),
        );

        let handle = self.deps.handles.create(role);
        let (handle, outcome) = self.load_and_run(handle, &request).await;

        if self.is_open(&task_id, created_at) {
            match outcome {
                Ok(artifact) => {
                    self.transition(&task_id, TaskUpdate::completed(artifact));
                }
                Err(err) => self.fail(&task_id, &err),
            }
        }

        Self::unload(&task_id, handle).await;
        lease.release();

        if self.is_current(&task_id, created_at) {
            self.schedule_cleanup(&task_id);
        }
        tracing::info!(
            task_id = %task_id,
            role = %role,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Generation task finished"
        );
    }

    /// 加载并运行，返回 handle 供后续卸载
    ///
    /// handle 只有在阻塞任务 panic 时才会丢失，此时它已随栈展开被 drop
    async fn load_and_run(
        &self,
        mut handle: Box<dyn ModelHandle>,
        request: &GenerationRequest,
    ) -> (Option<Box<dyn ModelHandle>>, Result<Artifact, ApplicationError>) {
        let task_id = request.task_id.clone();
        let role = handle.role();

        let loaded = tokio::task::spawn_blocking(move || {
            let result = handle.ensure_loaded();
            (handle, result)
        })
        .await;
        let mut handle = match loaded {
            Ok((handle, Ok(()))) => handle,
            Ok((handle, Err(e))) => return (Some(handle), Err(e.into())),
            Err(e) => {
                return (
                    None,
                    Err(ApplicationError::internal(format!("model load aborted: {}", e))),
                )
            }
        };

        self.transition(
            &task_id,
            TaskUpdate::processing(RUN_PROGRESS_START, Some("generating".to_string())),
        );

        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let reporter = ProgressReporter::new(progress_tx, cancel.clone());
        let forwarder = tokio::spawn(self.clone().forward_progress(
            task_id.clone(),
            progress_rx,
            cancel.clone(),
        ));

        let run_request = request.clone();
        let mut run = tokio::task::spawn_blocking(move || {
            let result = handle.run(&run_request, &reporter);
            (handle, result)
        });

        let run_timeout = self.deps.catalog.run_timeout(role);
        let joined = match tokio::time::timeout(run_timeout, &mut run).await {
            Ok(joined) => joined,
            Err(_) => {
                cancel.cancel();
                let err = ApplicationError::execution(format!(
                    "generation timed out after {}s",
                    run_timeout.as_secs()
                ));
                self.fail(&task_id, &err);
                tracing::warn!(
                    task_id = %task_id,
                    role = %role,
                    "Waiting for timed out generation to stop before unloading"
                );
                run.await
            }
        };

        if let Err(e) = forwarder.await {
            tracing::error!(task_id = %task_id, error = %e, "Progress forwarder aborted");
        }

        match joined {
            Ok((handle, result)) => (Some(handle), result.map_err(ApplicationError::from)),
            Err(e) => (
                None,
                Err(ApplicationError::internal(format!("generation aborted: {}", e))),
            ),
        }
    }

    /// 把管线上报的进度写入注册表，reporter drop 后结束
    async fn forward_progress(
        self,
        task_id: String,
        mut receiver: mpsc::UnboundedReceiver<ProgressReport>,
        cancel: CancellationToken,
    ) {
        while let Some(report) = receiver.recv().await {
            if cancel.is_cancelled() {
                continue;
            }
            self.transition(&task_id, TaskUpdate::processing(report.progress, report.message));
        }
    }

    async fn unload(task_id: &str, handle: Option<Box<dyn ModelHandle>>) {
        let Some(mut handle) = handle else {
            return;
        };
        if let Err(e) = tokio::task::spawn_blocking(move || handle.unload()).await {
            tracing::error!(task_id = %task_id, error = %e, "Model unload aborted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{LeaseStatusPort, ModelError};
    use crate::config::ModelsConfig;
    use crate::infrastructure::memory::InMemoryTaskRegistry;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Calls {
        loads: AtomicUsize,
        runs: AtomicUsize,
        unloads: AtomicUsize,
    }

    struct StubHandle {
        role: ModelRole,
        calls: Arc<Calls>,
        fail_run: bool,
        loaded: bool,
    }

    impl ModelHandle for StubHandle {
        fn role(&self) -> ModelRole {
            self.role
        }

        fn is_loaded(&self) -> bool {
            self.loaded
        }

        fn ensure_loaded(&mut self) -> Result<(), ModelError> {
            self.calls.loads.fetch_add(1, Ordering::SeqCst);
            self.loaded = true;
            Ok(())
        }

        fn run(
            &mut self,
            _request: &GenerationRequest,
            progress: &ProgressReporter,
        ) -> Result<Artifact, ModelError> {
            self.calls.runs.fetch_add(1, Ordering::SeqCst);
            progress.report(50, None);
            if self.fail_run {
                return Err(ModelError::execution("CUDA out of memory"));
            }
            Ok(Artifact::from_files(vec![PathBuf::from("out/image_0.png")]))
        }

        fn unload(&mut self) {
            self.calls.unloads.fetch_add(1, Ordering::SeqCst);
            self.loaded = false;
        }
    }

    struct StubFactory {
        calls: Arc<Calls>,
        fail_run: bool,
    }

    impl ModelHandleFactory for StubFactory {
        fn create(&self, role: ModelRole) -> Box<dyn ModelHandle> {
            Box::new(StubHandle {
                role,
                calls: self.calls.clone(),
                fail_run: self.fail_run,
                loaded: false,
            })
        }
    }

    fn request(task_id: &str) -> GenerationRequest {
        GenerationRequest {
            task_id: task_id.to_string(),
            params: crate::domain::GenerationParams::from_json(
                ModelRole::ImageGenerator,
                serde_json::json!({"prompt": "a cat"}),
            )
            .unwrap(),
        }
    }

    fn setup(
        enabled: bool,
        fail_run: bool,
    ) -> (Arc<InMemoryTaskRegistry>, GenerationOrchestrator, Arc<Calls>, Arc<ResourceLeaseManager>) {
        let registry = InMemoryTaskRegistry::new().arc();
        let (cleanup, cleanup_worker) = CleanupScheduler::new(registry.clone());
        tokio::spawn(cleanup_worker.run());

        let mut models = ModelsConfig::default();
        models.image_generator.enabled = enabled;
        models.image_generator.path = Some(PathBuf::from("/models/image"));

        let calls = Arc::new(Calls::default());
        let leases = ResourceLeaseManager::new(1).arc();
        let deps = OrchestratorDeps {
            registry: registry.clone(),
            leases: leases.clone(),
            catalog: Arc::new(models),
            handles: Arc::new(StubFactory {
                calls: calls.clone(),
                fail_run,
            }),
            publisher: EventPublisher::new().arc(),
            cleanup,
        };
        let config = OrchestratorConfig {
            acquire_timeout: Duration::from_millis(200),
            ..OrchestratorConfig::default()
        };
        let (orchestrator, worker) = GenerationOrchestrator::new(config, deps);
        tokio::spawn(worker.run());
        (registry, orchestrator, calls, leases)
    }

    async fn wait_terminal(registry: &InMemoryTaskRegistry, task_id: &str) -> TaskRecord {
        for _ in 0..200 {
            if let Some(record) = registry.get(task_id) {
                if record.is_terminal() {
                    return record;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {} did not finish", task_id);
    }

    #[tokio::test]
    async fn test_submit_returns_starting_record() {
        let (_registry, orchestrator, _calls, _leases) = setup(true, false);
        let record = orchestrator.submit(request("t1")).unwrap();
        assert_eq!(record.status(), TaskStatus::Starting);
        assert_eq!(record.progress(), 0);
    }

    #[tokio::test]
    async fn test_successful_run_completes_and_unloads() {
        let (registry, orchestrator, calls, leases) = setup(true, false);
        orchestrator.submit(request("t1")).unwrap();

        let record = wait_terminal(&registry, "t1").await;
        assert_eq!(record.status(), TaskStatus::Completed);
        assert_eq!(record.progress(), 100);
        assert_eq!(record.result().unwrap().files.len(), 1);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(calls.unloads.load(Ordering::SeqCst), 1);
        assert!(leases.holder(ModelRole::ImageGenerator).is_none());
    }

    #[tokio::test]
    async fn test_failed_run_still_unloads_and_releases() {
        let (registry, orchestrator, calls, leases) = setup(true, true);
        orchestrator.submit(request("t1")).unwrap();

        let record = wait_terminal(&registry, "t1").await;
        assert_eq!(record.status(), TaskStatus::Failed);
        assert_eq!(record.error(), Some("Execution error: CUDA out of memory"));
        assert!(record.progress() >= RUN_PROGRESS_START);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(calls.unloads.load(Ordering::SeqCst), 1);
        assert!(leases.holder(ModelRole::ImageGenerator).is_none());
    }

    #[tokio::test]
    async fn test_disabled_role_fails_without_lease() {
        let (registry, orchestrator, calls, leases) = setup(false, false);
        orchestrator.submit(request("t1")).unwrap();

        let record = wait_terminal(&registry, "t1").await;
        assert_eq!(record.status(), TaskStatus::Failed);
        assert!(record.error().unwrap().starts_with("Configuration error:"));
        assert_eq!(leases.grants(ModelRole::ImageGenerator), 0);
        assert_eq!(calls.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_duplicate_in_flight_submission_rejected() {
        let (_registry, orchestrator, _calls, leases) = setup(true, false);
        // 占住租约让 t1 停在 Starting
        let _held = leases
            .acquire(ModelRole::ImageGenerator, "other", Duration::from_millis(10))
            .await
            .unwrap();

        orchestrator.submit(request("t1")).unwrap();
        let result = orchestrator.submit(request("t1"));
        assert!(matches!(result, Err(DispatchError::Task(TaskError::Duplicate(_)))));
    }

    #[tokio::test]
    async fn test_lease_timeout_fails_with_resource_busy() {
        let (registry, orchestrator, calls, leases) = setup(true, false);
        let _held = leases
            .acquire(ModelRole::ImageGenerator, "other", Duration::from_millis(10))
            .await
            .unwrap();

        orchestrator.submit(request("t1")).unwrap();
        let record = wait_terminal(&registry, "t1").await;
        assert!(record.error().unwrap().starts_with("Resource busy:"));
        assert_eq!(calls.loads.load(Ordering::SeqCst), 0);
        assert_eq!(calls.unloads.load(Ordering::SeqCst), 0);
    }
}
