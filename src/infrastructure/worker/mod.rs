//! Worker Layer - Background Task Processing
//!
//! 实现 GenerationOrchestrator 和 CleanupScheduler

mod cleanup_scheduler;
mod orchestrator;

pub use cleanup_scheduler::{CleanupScheduler, CleanupWorker};
pub use orchestrator::{
    GenerationOrchestrator, GenerationWorker, OrchestratorConfig, OrchestratorDeps,
};
