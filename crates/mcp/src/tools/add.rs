use std::sync::Arc;

use async_trait::async_trait;
use pmcp::{RequestHandlerExtra, Result as McpResult, ToolHandler};
use serde::Deserialize;
use serde_json::{json, Value};
use taskflow_core::dates::local_today;
use taskflow_core::model::NewTask;
use taskflow_core::services::TasksService;

use super::util::{
    internal_error, parse_date_arg, parse_priority, parse_time_arg, task_json, validation_error,
};

pub struct AddTaskTool {
    service: Arc<TasksService>,
}

impl AddTaskTool {
    pub fn new(service: Arc<TasksService>) -> Self {
        Self { service }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddTaskArgs {
    title: String,
    description: Option<String>,
    priority: Option<String>,
    category: Option<String>,
    due_date: Option<String>,
    due_time: Option<String>,
}

impl AddTaskArgs {
    fn into_task(self) -> McpResult<NewTask> {
        let mut task = NewTask::titled(self.title.trim());
        task.description = self
            .description
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());
        if let Some(priority) = parse_priority(self.priority.as_deref())? {
            task.priority = priority;
        }
        if let Some(category) = self.category.filter(|value| !value.trim().is_empty()) {
            task.category = category.trim().to_string();
        }
        if let Some(raw) = self.due_date.as_deref() {
            task.due_date = parse_date_arg(raw, local_today())?;
        }
        if let Some(raw) = self.due_time.as_deref() {
            task.due_time = parse_time_arg(raw)?;
        }
        task.validate().map_err(validation_error)?;
        Ok(task)
    }
}

#[async_trait]
impl ToolHandler for AddTaskTool {
    async fn handle(&self, args: Value, _extra: RequestHandlerExtra) -> McpResult<Value> {
        let parsed: AddTaskArgs = serde_json::from_value(args).map_err(validation_error)?;
        let task = parsed.into_task()?;

        self.service.refresh().await.map_err(internal_error)?;
        let created = self.service.capture(task).await.map_err(internal_error)?;
        match created {
            Some(task) => Ok(task_json(&task)),
            None => Err(validation_error(
                "No signed-in user; set TASKFLOW_USER_ID to create tasks",
            )),
        }
    }

    fn metadata(&self) -> Option<pmcp::types::ToolInfo> {
        Some(pmcp::types::ToolInfo::new(
            "add_task".to_string(),
            Some("Create a task for the signed-in user and return it with its new id".to_string()),
            json!({
                "type": "object",
                "required": ["title"],
                "properties": {
                    "title": { "type": "string", "minLength": 1, "maxLength": 200 },
                    "description": { "type": "string", "maxLength": 1000 },
                    "priority": { "type": "string", "enum": ["high", "medium", "low"] },
                    "category": {
                        "type": "string",
                        "description": "work, personal, study, health or a custom category id"
                    },
                    "dueDate": {
                        "type": "string",
                        "description": "YYYY-MM-DD, today, tomorrow, +3d or a weekday"
                    },
                    "dueTime": { "type": "string", "description": "HH:MM" }
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

    use crate::tools::util::{test_extra, test_service};

    #[tokio::test]
    async fn add_creates_task_with_extras() {
        let (service, api, _dir) = test_service();
        let tool = AddTaskTool::new(service);

        let response = tool
            .handle(
                json!({
                    "title": "Write integration tests",
                    "description": "Cover MCP flow",
                    "priority": "high",
                    "category": "study",
                    "dueDate": "2026-04-01",
                    "dueTime": "18:00"
                }),
                test_extra(),
            )
            .await
            .expect("add result");

        assert_eq!(response["title"].as_str(), Some("Write integration tests"));
        assert_eq!(response["priority"].as_str(), Some("high"));
        assert_eq!(response["category"].as_str(), Some("study"));
        assert_eq!(response["dueDate"].as_str(), Some("2026-04-01"));
        assert_eq!(response["dueTime"].as_str(), Some("18:00"));
        assert_eq!(api.calls(Operation::Create), 1);
    }

    #[tokio::test]
    async fn add_rejects_blank_and_long_titles() {
        let (service, api, _dir) = test_service();
        let tool = AddTaskTool::new(service);

        for title in [String::from("   "), "x".repeat(201)] {
            let result = tool.handle(json!({ "title": title }), test_extra()).await;
            assert!(result.is_err());
        }
        assert_eq!(api.calls(Operation::Create), 0);
    }

    #[tokio::test]
    async fn add_rejects_unknown_priority() {
        let (service, _api, _dir) = test_service();
        let tool = AddTaskTool::new(service);

        let result = tool
            .handle(
                json!({ "title": "Plan", "priority": "urgent" }),
                test_extra(),
            )
            .await;
        assert!(result.is_err());
    }
}
