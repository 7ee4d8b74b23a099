//! GenForge - 生成式模型生命周期与任务编排服务
//!
//! 架构设计: DDD + CQRS + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - ModelRole: 四个模型角色（提示词优化、文生图、图像编辑、视频生成）
//! - Task: 任务状态机与进度记录
//!
//! 应用层 (application/):
//! - Ports: 端口定义（TaskRegistry, ModelHandle, ModelCatalog, ArtifactStorage, GenerationDispatch）
//! - Commands: 提交生成、确认任务
//! - Queries: 进度轮询与流式推送、模型状态
//!
//! 基础设施层 (infrastructure/):
//! - HTTP: RESTful API + SSE + WebSocket
//! - Memory: TaskRegistry 与 ResourceLeaseManager 内存实现
//! - Worker: GenerationOrchestrator 生命周期编排, CleanupScheduler 延迟清理
//! - Adapters: 模型句柄与产物存储
//! - Events: WebSocket 事件发布

pub mod app;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use app::{Application, WorkerHandles, Workers};
pub use config::{load_config, AppConfig};
