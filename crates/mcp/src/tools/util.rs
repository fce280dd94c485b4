use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use serde_json::{json, Value};
use taskflow_core::dates::{parse_due_date, parse_due_time};
use taskflow_core::model::{Priority, Task};

pub fn validation_error(err: impl std::fmt::Display) -> pmcp::Error {
    pmcp::Error::validation(err.to_string())
}

pub fn internal_error(err: impl Into<anyhow::Error>) -> pmcp::Error {
    pmcp::Error::internal(err.into().to_string())
}

pub fn parse_priority(raw: Option<&str>) -> pmcp::Result<Option<Priority>> {
    raw.map(|value| value.parse::<Priority>())
        .transpose()
        .map_err(validation_error)
}

/// Blank strings clear the date; anything else must resolve.
pub fn parse_date_arg(raw: &str, today: NaiveDate) -> pmcp::Result<Option<NaiveDate>> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    parse_due_date(raw, today)
        .map(Some)
        .map_err(validation_error)
}

pub fn parse_time_arg(raw: &str) -> pmcp::Result<Option<NaiveTime>> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    parse_due_time(raw).map(Some).map_err(validation_error)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskIdArgs {
    pub task_id: Value,
}

impl TaskIdArgs {
    /// Accepts the id as a JSON number or string.
    pub fn id(&self) -> pmcp::Result<String> {
        task_id_arg(&self.task_id)
    }
}

pub fn task_id_arg(value: &Value) -> pmcp::Result<String> {
    match value {
        Value::Number(number) => Ok(number.to_string()),
        Value::String(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        _ => Err(validation_error(
            "taskId must be a non-empty string or number",
        )),
    }
}

/// Tool-facing view of a task.
pub fn task_json(task: &Task) -> Value {
    json!({
        "id": task.id,
        "title": task.title,
        "description": task.description,
        "priority": task.priority.as_str(),
        "category": task.category,
        "dueDate": task.due_date.map(|date| date.to_string()),
        "dueTime": task.due_time.map(|time| time.format("%H:%M").to_string()),
        "recurring": task.recurring,
        "reminder": task.reminder,
        "completed": task.completed,
        "createdAt": task.created_at.to_rfc3339(),
    })
}

#[cfg(test)]
pub(crate) const TEST_USER: &str = "user-1";

#[cfg(test)]
pub(crate) fn test_service() -> (
    std::sync::Arc<taskflow_core::services::TasksService>,
    std::sync::Arc<taskflow_core::api::InMemoryTaskApi>,
    tempfile::TempDir,
) {
    use std::sync::Arc;
    use taskflow_core::api::InMemoryTaskApi;
    use taskflow_core::config::{AppConfig, TokenSource};
    use taskflow_core::services::TasksService;

    let dir = tempfile::TempDir::new().expect("temp dir");
    let config = AppConfig::from_data_dir(dir.path().to_path_buf())
        .expect("config")
        .with_session(TEST_USER, TokenSource::None);
    let api = Arc::new(InMemoryTaskApi::new());
    let service = TasksService::with_api(config, api.clone()).expect("service");
    (Arc::new(service), api, dir)
}

#[cfg(test)]
pub(crate) fn test_extra() -> pmcp::RequestHandlerExtra {
    pmcp::RequestHandlerExtra::new(
        "test-request".to_string(),
        tokio_util::sync::CancellationToken::new(),
    )
}
