//! Application Assembly - 组装各层组件
//!
//! main 和集成测试共用同一套装配逻辑：测试替换 ModelHandleFactory，
//! 其余组件与生产环境一致。

use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::application::ports::{ArtifactStoragePort, ModelHandleFactory, StorageError};
use crate::config::AppConfig;
use crate::infrastructure::adapters::{FileArtifactStorage, PipelineHandleFactory, PlaceholderBackend};
use crate::infrastructure::events::EventPublisher;
use crate::infrastructure::http::{build_router, AppState};
use crate::infrastructure::memory::{InMemoryTaskRegistry, ResourceLeaseManager};
use crate::infrastructure::worker::{
    CleanupScheduler, CleanupWorker, GenerationOrchestrator, GenerationWorker,
    OrchestratorConfig, OrchestratorDeps,
};

/// 已装配的应用
pub struct Application {
    pub state: Arc<AppState>,
    pub registry: Arc<InMemoryTaskRegistry>,
    pub leases: Arc<ResourceLeaseManager>,
    pub event_publisher: Arc<EventPublisher>,
    max_body_bytes: usize,
}

/// 尚未启动的后台 worker
pub struct Workers {
    generation: GenerationWorker,
    cleanup: CleanupWorker,
}

/// 已启动的后台 worker
pub struct WorkerHandles {
    generation: JoinHandle<()>,
    cleanup: JoinHandle<()>,
}

impl Application {
    /// 使用占位生成后端装配
    pub fn with_placeholder_backend(config: &AppConfig) -> Result<(Self, Workers), StorageError> {
        let storage: Arc<dyn ArtifactStoragePort> = Arc::new(FileArtifactStorage::new(
            &config.storage.output_dir,
            &config.storage.staging_dir,
        )?);
        let backend = Arc::new(PlaceholderBackend::new(config.backend.clone()));
        let handles = Arc::new(PipelineHandleFactory::new(
            Arc::new(config.models.clone()),
            backend,
            storage,
        ));
        Ok(Self::build(config, handles))
    }

    /// 使用指定的 ModelHandleFactory 装配
    pub fn build(config: &AppConfig, handles: Arc<dyn ModelHandleFactory>) -> (Self, Workers) {
        let catalog = Arc::new(config.models.clone());
        let registry = InMemoryTaskRegistry::new().arc();
        let leases = ResourceLeaseManager::new(config.lease.global_capacity).arc();
        let event_publisher = EventPublisher::new().arc();

        let (cleanup, cleanup_worker) = CleanupScheduler::new(registry.clone());

        let deps = OrchestratorDeps {
            registry: registry.clone(),
            leases: leases.clone(),
            catalog: catalog.clone(),
            handles,
            publisher: event_publisher.clone(),
            cleanup,
        };
        let (orchestrator, generation_worker) =
            GenerationOrchestrator::new(OrchestratorConfig::from_app_config(config), deps);

        let state = Arc::new(AppState::new(
            registry.clone(),
            orchestrator.arc(),
            catalog,
            leases.clone(),
            event_publisher.clone(),
            Duration::from_millis(config.progress.stream_interval_ms),
        ));

        let app = Self {
            state,
            registry,
            leases,
            event_publisher,
            max_body_bytes: config.server.max_body_bytes,
        };
        let workers = Workers {
            generation: generation_worker,
            cleanup: cleanup_worker,
        };
        (app, workers)
    }

    /// 带全部中间件的 Router
    pub fn router(&self) -> Router {
        build_router(self.state.clone(), self.max_body_bytes)
    }
}

impl Workers {
    /// 启动后台 worker
    pub fn spawn(self) -> WorkerHandles {
        WorkerHandles {
            generation: tokio::spawn(self.generation.run()),
            cleanup: tokio::spawn(self.cleanup.run()),
        }
    }
}

impl WorkerHandles {
    /// 等待进行中的生成任务完成卸载（最多 `grace`），然后停止清理循环
    ///
    /// 需要先 drop 所有 AppState，生成 worker 才会停止接收
    pub async fn shutdown(self, grace: Duration) {
        match tokio::time::timeout(grace, self.generation).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Generation worker aborted"),
            Err(_) => tracing::warn!(
                grace_secs = grace.as_secs(),
                "Generation worker did not drain in time"
            ),
        }
        self.cleanup.abort();
    }
}
