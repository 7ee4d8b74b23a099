//! Generation Command Handlers

use std::sync::Arc;
use uuid::Uuid;

use crate::application::commands::generation_commands::*;
use crate::application::error::ApplicationError;
use crate::application::ports::{
    GenerationDispatchPort, GenerationRequest, ModelCatalogPort, TaskRegistryPort,
};
use crate::domain::GenerationParams;

const MAX_TASK_ID_LEN: usize = 128;

fn validate_task_id(task_id: &str) -> Result<(), ApplicationError> {
    if task_id.trim().is_empty() {
        return Err(ApplicationError::validation("task_id must not be empty"));
    }
    if task_id.len() > MAX_TASK_ID_LEN {
        return Err(ApplicationError::validation(format!(
            "task_id must be at most {} bytes",
            MAX_TASK_ID_LEN
        )));
    }
    if task_id.chars().any(|c| c.is_control() || c == '/') {
        return Err(ApplicationError::validation(
            "task_id must not contain control characters or '/'",
        ));
    }
    Ok(())
}

/// SubmitGeneration Handler - 提交生成任务
///
/// 校验全部发生在创建记录之前：参数错误不会留下任何任务记录
pub struct SubmitGenerationHandler {
    dispatcher: Arc<dyn GenerationDispatchPort>,
    catalog: Arc<dyn ModelCatalogPort>,
}

impl SubmitGenerationHandler {
    pub fn new(
        dispatcher: Arc<dyn GenerationDispatchPort>,
        catalog: Arc<dyn ModelCatalogPort>,
    ) -> Self {
        Self {
            dispatcher,
            catalog,
        }
    }

    pub fn handle(
        &self,
        cmd: SubmitGenerationCommand,
    ) -> Result<SubmitGenerationResponse, ApplicationError> {
        let task_id = match cmd.task_id {
            Some(task_id) => {
                validate_task_id(&task_id)?;
                task_id
            }
            None => Uuid::new_v4().to_string(),
        };

        let params = GenerationParams::from_json(cmd.role, cmd.params)?;

        if !self.catalog.is_role_enabled(cmd.role) {
            tracing::warn!(task_id = %task_id, role = %cmd.role, "Rejecting task for disabled role");
            return Err(ApplicationError::configuration(format!(
                "{} is disabled",
                cmd.role
            )));
        }

        let record = self
            .dispatcher
            .submit(GenerationRequest { task_id, params })?;

        Ok(SubmitGenerationResponse {
            task_id: record.task_id().to_string(),
            status: record.status(),
        })
    }
}

/// AcknowledgeTask Handler - 客户端确认后立即删除终态记录
pub struct AcknowledgeTaskHandler {
    registry: Arc<dyn TaskRegistryPort>,
}

impl AcknowledgeTaskHandler {
    pub fn new(registry: Arc<dyn TaskRegistryPort>) -> Self {
        Self { registry }
    }

    pub fn handle(
        &self,
        cmd: AcknowledgeTaskCommand,
    ) -> Result<AcknowledgeTaskResponse, ApplicationError> {
        let Some(record) = self.registry.get(&cmd.task_id) else {
            return Ok(AcknowledgeTaskResponse {
                task_id: cmd.task_id,
                removed: false,
            });
        };

        if !record.is_terminal() {
            return Err(ApplicationError::invalid_state(format!(
                "task {} is still {}",
                cmd.task_id,
                record.status()
            )));
        }

        let removed = self
            .registry
            .remove_if_terminal(&cmd.task_id, record.created_at());
        tracing::info!(task_id = %cmd.task_id, removed = removed, "Task acknowledged");

        Ok(AcknowledgeTaskResponse {
            task_id: cmd.task_id,
            removed,
        })
    }
}
