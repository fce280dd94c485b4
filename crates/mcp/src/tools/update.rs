use std::sync::Arc;

use async_trait::async_trait;
use pmcp::{RequestHandlerExtra, Result as McpResult, ToolHandler};
use serde::Deserialize;
use serde_json::{json, Value};
use taskflow_core::dates::local_today;
use taskflow_core::model::{TaskPatch, MAX_DESCRIPTION_LEN, MAX_TITLE_LEN};
use taskflow_core::services::TasksService;
use taskflow_core::sync::SyncOutcome;

use super::util::{
    internal_error, parse_date_arg, parse_priority, parse_time_arg, task_id_arg, task_json,
    validation_error,
};

pub struct UpdateTaskTool {
    service: Arc<TasksService>,
}

impl UpdateTaskTool {
    pub fn new(service: Arc<TasksService>) -> Self {
        Self { service }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateTaskArgs {
    task_id: Value,
    title: Option<String>,
    description: Option<String>,
    priority: Option<String>,
    category: Option<String>,
    due_date: Option<String>,
    due_time: Option<String>,
}

impl UpdateTaskArgs {
    fn to_patch(&self) -> McpResult<TaskPatch> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(validation_error("Title cannot be empty"));
            }
            if title.trim().chars().count() > MAX_TITLE_LEN {
                return Err(validation_error(format!(
                    "Title must be {MAX_TITLE_LEN} characters or less"
                )));
            }
        }
        if let Some(description) = &self.description {
            if description.chars().count() > MAX_DESCRIPTION_LEN {
                return Err(validation_error(format!(
                    "Description must be {MAX_DESCRIPTION_LEN} characters or less"
                )));
            }
        }

        let patch = TaskPatch {
            title: self.title.clone(),
            description: self
                .description
                .clone()
                .map(|text| Some(text).filter(|text| !text.trim().is_empty())),
            priority: parse_priority(self.priority.as_deref())?,
            category: self
                .category
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
            due_date: self
                .due_date
                .as_deref()
                .map(|raw| parse_date_arg(raw, local_today()))
                .transpose()?,
            due_time: self.due_time.as_deref().map(parse_time_arg).transpose()?,
            ..TaskPatch::default()
        };
        if patch.is_empty() {
            return Err(validation_error("Provide at least one field to update"));
        }
        Ok(patch)
    }
}

#[async_trait]
impl ToolHandler for UpdateTaskTool {
    async fn handle(&self, args: Value, _extra: RequestHandlerExtra) -> McpResult<Value> {
        let parsed: UpdateTaskArgs = serde_json::from_value(args).map_err(validation_error)?;
        let id = task_id_arg(&parsed.task_id)?;
        let patch = parsed.to_patch()?;

        self.service.refresh().await.map_err(internal_error)?;
        let change = self
            .service
            .edit(&id, &patch)
            .await
            .map_err(validation_error)?
            .ok_or_else(|| validation_error(format!("Task {id} not found")))?;
        if let SyncOutcome::Compensated { reason } = &change.outcome {
            return Err(internal_error(anyhow::anyhow!(
                "Server rejected the update: {reason}"
            )));
        }

        let task = self
            .service
            .fetch_task(&id)
            .ok_or_else(|| internal_error(anyhow::anyhow!("Task {id} vanished after update")))?;
        Ok(task_json(&task))
    }

    fn metadata(&self) -> Option<pmcp::types::ToolInfo> {
        Some(pmcp::types::ToolInfo::new(
            "update_task".to_string(),
            Some("Change a task's title, description, priority, category or due date".to_string()),
            json!({
                "type": "object",
                "required": ["taskId"],
                "properties": {
                    "taskId": { "type": ["integer", "string"] },
                    "title": { "type": "string", "minLength": 1, "maxLength": 200 },
                    "description": { "type": "string", "maxLength": 1000 },
                    "priority": { "type": "string", "enum": ["high", "medium", "low"] },
                    "category": { "type": "string" },
                    "dueDate": {
                        "type": "string",
                        "description": "YYYY-MM-DD or shorthand; empty string clears it"
                    },
                    "dueTime": { "type": "string", "description": "HH:MM; empty string clears it" }
                }
            }),
        ))
    }
}
