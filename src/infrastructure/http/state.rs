//! Application State
//!
//! 包含所有 Command/Query Handlers 的应用状态

use std::sync::Arc;
use std::time::Duration;

use crate::application::{
    // Command handlers
    AcknowledgeTaskHandler, SubmitGenerationHandler,
    // Query handlers
    GetModelStatusHandler, ProgressPublisher,
    // Ports
    GenerationDispatchPort, LeaseStatusPort, ModelCatalogPort, TaskRegistryPort,
};
use crate::infrastructure::events::EventPublisher;

/// 应用状态
pub struct AppState {
    // ========== Ports ==========
    pub registry: Arc<dyn TaskRegistryPort>,
    pub event_publisher: Arc<EventPublisher>,

    // ========== Command Handlers ==========
    pub submit_generation_handler: SubmitGenerationHandler,
    pub acknowledge_task_handler: AcknowledgeTaskHandler,

    // ========== Query Handlers ==========
    pub progress_publisher: ProgressPublisher,
    pub model_status_handler: GetModelStatusHandler,
}

impl AppState {
    /// 创建应用状态
    pub fn new(
        registry: Arc<dyn TaskRegistryPort>,
        dispatcher: Arc<dyn GenerationDispatchPort>,
        catalog: Arc<dyn ModelCatalogPort>,
        leases: Arc<dyn LeaseStatusPort>,
        event_publisher: Arc<EventPublisher>,
        stream_interval: Duration,
    ) -> Self {
        Self {
            // Ports
            registry: registry.clone(),
            event_publisher,

            // Command handlers
            submit_generation_handler: SubmitGenerationHandler::new(dispatcher, catalog.clone()),
            acknowledge_task_handler: AcknowledgeTaskHandler::new(registry.clone()),

            // Query handlers
            progress_publisher: ProgressPublisher::new(registry, stream_interval),
            model_status_handler: GetModelStatusHandler::new(catalog, leases),
        }
    }
}
