//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（TaskRegistry、ModelHandle、GenerationBackend、ArtifactStorage 等）
//! - commands: CQRS 命令及处理器
//! - queries: CQRS 查询及处理器（含 ProgressPublisher）
//! - error: 应用层错误定义

pub mod commands;
pub mod error;
pub mod ports;
pub mod queries;

// Re-exports
pub use commands::{
    AcknowledgeTaskCommand,
    AcknowledgeTaskResponse,
    SubmitGenerationCommand,
    SubmitGenerationResponse,
    // Handlers
    handlers::{AcknowledgeTaskHandler, SubmitGenerationHandler},
};

pub use error::ApplicationError;

pub use ports::{
    // Artifact storage
    ArtifactStoragePort,
    StorageError,
    // Generation
    DispatchError,
    GenerationBackend,
    GenerationDispatchPort,
    GenerationRequest,
    LoadedPipeline,
    // Models
    LeaseInfo,
    LeaseStatusPort,
    ModelCatalogPort,
    ModelError,
    ModelHandle,
    ModelHandleFactory,
    ProgressReport,
    ProgressReporter,
    // Task registry
    TaskError,
    TaskRegistryPort,
};

pub use queries::{
    GetModelStatus,
    GetTaskProgress,
    StreamTaskProgress,
    // Handlers
    handlers::{
        GetModelStatusHandler, ModelRoleStatus, ModelStatusResponse, ProgressPublisher,
        TaskProgress,
    },
};
