use std::sync::Arc;

use async_trait::async_trait;
use pmcp::{RequestHandlerExtra, Result as McpResult, ToolHandler};
use serde_json::{json, Value};
use taskflow_core::services::TasksService;
use taskflow_core::sync::SyncOutcome;

use super::util::{internal_error, task_json, validation_error, TaskIdArgs};

/// Flips completion, matching the toggle semantics of the task list.
pub struct CompleteTaskTool {
    service: Arc<TasksService>,
}

impl CompleteTaskTool {
    pub fn new(service: Arc<TasksService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ToolHandler for CompleteTaskTool {
    async fn handle(&self, args: Value, _extra: RequestHandlerExtra) -> McpResult<Value> {
        let parsed: TaskIdArgs = serde_json::from_value(args).map_err(validation_error)?;
        let id = parsed.id()?;

        self.service.refresh().await.map_err(internal_error)?;
        let change = self
            .service
            .toggle(&id)
            .await
            .map_err(internal_error)?
            .ok_or_else(|| validation_error(format!("Task {id} not found")))?;
        if let SyncOutcome::Compensated { reason } = &change.outcome {
            return Err(internal_error(anyhow::anyhow!(
                "Server rejected the change: {reason}"
            )));
        }

        let task = self
            .service
            .fetch_task(&id)
            .ok_or_else(|| internal_error(anyhow::anyhow!("Task {id} vanished after toggle")))?;
        Ok(task_json(&task))
    }

    fn metadata(&self) -> Option<pmcp::types::ToolInfo> {
        Some(pmcp::types::ToolInfo::new(
            "complete_task".to_string(),
            Some(
                "Toggle a task between completed and pending; returns the updated task".to_string(),
            ),
            json!({
                "type": "object",
                "required": ["taskId"],
                "properties": {
                    "taskId": { "type": ["integer", "string"] }
                }
            }),
        ))
    }
}
