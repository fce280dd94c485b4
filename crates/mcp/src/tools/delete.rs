use std::sync::Arc;

use async_trait::async_trait;
use pmcp::{RequestHandlerExtra, Result as McpResult, ToolHandler};
use serde_json::{json, Value};
use taskflow_core::services::TasksService;
use taskflow_core::sync::SyncOutcome;

use super::util::{internal_error, validation_error, TaskIdArgs};

pub struct DeleteTaskTool {
    service: Arc<TasksService>,
}

impl DeleteTaskTool {
    pub fn new(service: Arc<TasksService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ToolHandler for DeleteTaskTool {
    async fn handle(&self, args: Value, _extra: RequestHandlerExtra) -> McpResult<Value> {
        let parsed: TaskIdArgs = serde_json::from_value(args).map_err(validation_error)?;
        let id = parsed.id()?;

        self.service.refresh().await.map_err(internal_error)?;
        let changes = self
            .service
            .delete(std::slice::from_ref(&id))
            .await
            .map_err(internal_error)?;
        let Some(change) = changes.into_iter().next() else {
            return Err(validation_error(format!("Task {id} not found")));
        };
        if let SyncOutcome::Compensated { reason } = change.outcome {
            return Err(internal_error(anyhow::anyhow!(
                "Server rejected the delete: {reason}"
            )));
        }

        Ok(json!({ "message": "Task deleted successfully", "id": change.id }))
    }

    fn metadata(&self) -> Option<pmcp::types::ToolInfo> {
        Some(pmcp::types::ToolInfo::new(
            "delete_task".to_string(),
            Some("Delete a task by id".to_string()),
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use taskflow_core::api::Operation;

    use crate::tools::util::{test_extra, test_service, TEST_USER};

    #[tokio::test]
    async fn delete_removes_task() {
        let (service, api, _dir) = test_service();
        let id = api.seed(TEST_USER, "Old", false).id;
        let tool = DeleteTaskTool::new(service);

        let response = tool
            .handle(json!({ "taskId": id }), test_extra())
            .await
            .expect("delete");

        assert_eq!(response["message"], "Task deleted successfully");
        assert!(api.records(TEST_USER).is_empty());
    }

    #[tokio::test]
    async fn delete_surfaces_missing_and_rejected() {
        let (service, api, _dir) = test_service();
        let id = api.seed(TEST_USER, "Keep", false).id;
        let tool = DeleteTaskTool::new(service.clone());

        assert!(tool
            .handle(json!({ "taskId": "404" }), test_extra())
            .await
            .is_err());
        assert!(tool
            .handle(json!({ "taskId": "" }), test_extra())
            .await
            .is_err());

        api.fail_next(Operation::Delete, 1);
        assert!(tool
            .handle(json!({ "taskId": id }), test_extra())
            .await
            .is_err());
        assert!(service.fetch_task(&id.to_string()).is_some());
    }
}
