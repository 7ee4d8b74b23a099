//! Pipeline Model Handle
//!
//! 把一个模型角色的 load / run / unload 映射到 GenerationBackend：
//! 加载前检查配置，运行时把产物写入暂存目录，成功才提交到输出目录。

use std::sync::Arc;

use crate::application::ports::{
    ArtifactStoragePort, GenerationBackend, GenerationRequest, LoadedPipeline, ModelCatalogPort,
    ModelError, ModelHandle, ModelHandleFactory, ProgressReporter,
};
use crate::domain::{Artifact, ModelRole};

/// 基于生成管线的 ModelHandle
pub struct PipelineModelHandle {
    role: ModelRole,
    catalog: Arc<dyn ModelCatalogPort>,
    backend: Arc<dyn GenerationBackend>,
    storage: Arc<dyn ArtifactStoragePort>,
    pipeline: Option<Box<dyn LoadedPipeline>>,
}

impl PipelineModelHandle {
    pub fn new(
        role: ModelRole,
        catalog: Arc<dyn ModelCatalogPort>,
        backend: Arc<dyn GenerationBackend>,
        storage: Arc<dyn ArtifactStoragePort>,
    ) -> Self {
        Self {
            role,
            catalog,
            backend,
            storage,
            pipeline: None,
        }
    }
}

impl ModelHandle for PipelineModelHandle {
    fn role(&self) -> ModelRole {
        self.role
    }

    fn is_loaded(&self) -> bool {
        self.pipeline.is_some()
    }

    fn ensure_loaded(&mut self) -> Result<(), ModelError> {
        if self.pipeline.is_some() {
            return Ok(());
        }

        if !self.catalog.is_role_enabled(self.role) {
            return Err(ModelError::unavailable(self.role, "role is disabled"));
        }
        let model_path = self
            .catalog
            .model_path(self.role)
            .ok_or_else(|| ModelError::unavailable(self.role, "model path is not configured"))?;
        if !model_path.exists() {
            return Err(ModelError::unavailable(
                self.role,
                format!("model path does not exist: {}", model_path.display()),
            ));
        }

        let started = std::time::Instant::now();
        let pipeline = self.backend.load(self.role, &model_path)?;
        self.pipeline = Some(pipeline);

        tracing::info!(
            role = %self.role,
            backend = self.backend.name(),
            path = %model_path.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Model loaded"
        );
        Ok(())
    }

    fn run(
        &mut self,
        request: &GenerationRequest,
        progress: &ProgressReporter,
    ) -> Result<Artifact, ModelError> {
        if request.params.role() != self.role {
            return Err(ModelError::execution(format!(
                "{} handle cannot run {} parameters",
                self.role,
                request.params.role()
            )));
        }
        let pipeline = self
            .pipeline
            .as_mut()
            .ok_or_else(|| ModelError::execution("model is not loaded"))?;

        let staging = self
            .storage
            .create_staging(&request.task_id)
            .map_err(|e| ModelError::execution(format!("failed to prepare staging: {}", e)))?;

        let generated = match pipeline.generate(&request.params, &staging, progress) {
            Ok(_) if progress.is_cancelled() => Err(ModelError::Cancelled),
            other => other,
        };

        let artifact = match generated {
            Ok(artifact) => artifact,
            Err(e) => {
                self.storage.discard(&staging);
                return Err(e);
            }
        };

        let files = self
            .storage
            .commit(&staging, &artifact.files, request.params.output_subdir())
            .map_err(|e| {
                self.storage.discard(&staging);
                ModelError::execution(format!("failed to store artifacts: {}", e))
            })?;

        tracing::debug!(
            task_id = %request.task_id,
            role = %self.role,
            files = files.len(),
            "Generation finished"
        );
        Ok(Artifact {
            files,
            text: artifact.text,
        })
    }

    fn unload(&mut self) {
        if self.pipeline.take().is_some() {
            tracing::info!(role = %self.role, "Model unloaded");
        }
    }
}

impl Drop for PipelineModelHandle {
    fn drop(&mut self) {
        self.unload();
    }
}

/// 按角色创建 PipelineModelHandle
pub struct PipelineHandleFactory {
    catalog: Arc<dyn ModelCatalogPort>,
    backend: Arc<dyn GenerationBackend>,
    storage: Arc<dyn ArtifactStoragePort>,
}

impl PipelineHandleFactory {
    pub fn new(
        catalog: Arc<dyn ModelCatalogPort>,
        backend: Arc<dyn GenerationBackend>,
        storage: Arc<dyn ArtifactStoragePort>,
    ) -> Self {
        Self {
            catalog,
            backend,
            storage,
        }
    }
}

impl ModelHandleFactory for PipelineHandleFactory {
    fn create(&self, role: ModelRole) -> Box<dyn ModelHandle> {
        Box::new(PipelineModelHandle::new(
            role,
            self.catalog.clone(),
            self.backend.clone(),
            self.storage.clone(),
        ))
    }
}
