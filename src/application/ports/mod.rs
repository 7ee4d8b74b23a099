//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod artifact_storage;
mod generation_backend;
mod generation_dispatch;
mod lease_status;
mod model_catalog;
mod model_handle;
mod task_registry;

pub use artifact_storage::{ArtifactStoragePort, StorageError};
pub use generation_backend::{GenerationBackend, LoadedPipeline};
pub use generation_dispatch::{DispatchError, GenerationDispatchPort};
pub use lease_status::{LeaseInfo, LeaseStatusPort};
pub use model_catalog::ModelCatalogPort;
pub use model_handle::{
    GenerationRequest, ModelError, ModelHandle, ModelHandleFactory, ProgressReport,
    ProgressReporter, RUN_PROGRESS_END, RUN_PROGRESS_START,
};
pub use task_registry::{TaskError, TaskRegistryPort};
