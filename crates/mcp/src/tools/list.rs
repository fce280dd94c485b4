use std::sync::Arc;

use async_trait::async_trait;
use pmcp::{RequestHandlerExtra, Result as McpResult, ToolHandler};
use serde::Deserialize;
use serde_json::{json, Value};
use taskflow_core::dates::local_today;
use taskflow_core::model::TaskFilter;
use taskflow_core::services::TasksService;

use super::util::{internal_error, task_json, validation_error};

pub struct ListTasksTool {
    service: Arc<TasksService>,
}

impl ListTasksTool {
    pub fn new(service: Arc<TasksService>) -> Self {
        Self { service }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListTasksArgs {
    filter: Option<String>,
    category: Option<String>,
}

#[async_trait]
impl ToolHandler for ListTasksTool {
    async fn handle(&self, args: Value, _extra: RequestHandlerExtra) -> McpResult<Value> {
        let parsed: ListTasksArgs = if args.is_null() {
            ListTasksArgs::default()
        } else {
            serde_json::from_value(args).map_err(validation_error)?
        };
        let filter = parsed
            .filter
            .as_deref()
            .map(TaskFilter::from_token)
            .unwrap_or_default();
        let category = parsed
            .category
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty());

        self.service.refresh().await.map_err(internal_error)?;
        let snapshot = self.service.view(filter, category, local_today());
        let tasks: Vec<Value> = snapshot.tasks.iter().map(task_json).collect();

        Ok(json!({
            "filter": snapshot.filter.as_str(),
            "category": snapshot.category,
            "pending": snapshot.pending,
            "completed": snapshot.completed,
            "tasks": tasks,
        }))
    }

    fn metadata(&self) -> Option<pmcp::types::ToolInfo> {
        Some(pmcp::types::ToolInfo::new(
            "list_tasks".to_string(),
            Some(
                "List the signed-in user's tasks, optionally narrowed by filter and category"
                    .to_string(),
            ),
            json!({
                "type": "object",
                "properties": {
                    "filter": {
                        "type": "string",
                        "enum": ["All", "Today", "High", "Medium", "Low", "Completed"]
                    },
                    "category": { "type": "string" }
                }
            }),
        ))
    }
}
