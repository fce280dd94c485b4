use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use super::TaskApi;
use crate::error::{ApiError, ApiResult};
use crate::model::{BackendTask, CreateTask, UpdateTask};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Create,
    Update,
    Delete,
    Toggle,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::List => "list",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Toggle => "toggle",
        }
    }
}

/// In-process backend with the same semantics as the REST service.
///
/// Failures can be injected per operation so callers can exercise their
/// rollback paths without a network.
#[derive(Default)]
pub struct InMemoryTaskApi {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    tasks: Vec<BackendTask>,
    next_id: i64,
    pending_failures: HashMap<Operation, usize>,
    calls: HashMap<Operation, usize>,
    latency: Option<Duration>,
}

impl InMemoryTaskApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record directly, bypassing call accounting.
    pub fn seed(&self, user_id: &str, title: &str, completed: bool) -> BackendTask {
        self.inner.lock().insert(user_id, title, None, completed)
    }

    /// Make the next `times` calls of `operation` fail.
    pub fn fail_next(&self, operation: Operation, times: usize) {
        *self
            .inner
            .lock()
            .pending_failures
            .entry(operation)
            .or_default() += times;
    }

    /// Delay every call, to widen windows between optimistic and compensating steps.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.inner.lock().latency = latency;
    }

    pub fn calls(&self, operation: Operation) -> usize {
        self.inner
            .lock()
            .calls
            .get(&operation)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.inner.lock().calls.values().sum()
    }

    pub fn records(&self, user_id: &str) -> Vec<BackendTask> {
        self.inner
            .lock()
            .tasks
            .iter()
            .filter(|task| task.user_id.as_deref() == Some(user_id))
            .cloned()
            .collect()
    }

    async fn begin(&self, operation: Operation) -> ApiResult<()> {
        let latency = {
            let mut inner = self.inner.lock();
            *inner.calls.entry(operation).or_default() += 1;
            inner.latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut inner = self.inner.lock();
        if let Some(remaining) = inner.pending_failures.get_mut(&operation) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ApiError::Injected(operation.as_str().to_string()));
            }
        }
        Ok(())
    }
}

impl Inner {
    fn insert(
        &mut self,
        user_id: &str,
        title: &str,
        description: Option<String>,
        completed: bool,
    ) -> BackendTask {
        self.next_id += 1;
        let now = Utc::now();
        let record = BackendTask {
            id: self.next_id,
            user_id: Some(user_id.to_string()),
            title: title.to_string(),
            description,
            completed,
            created_at: Some(now),
            updated_at: Some(now),
        };
        self.tasks.push(record.clone());
        record
    }

    fn find_mut(&mut self, user_id: &str, task_id: &str) -> Option<&mut BackendTask> {
        self.tasks.iter_mut().find(|task| {
            task.user_id.as_deref() == Some(user_id) && task.id.to_string() == task_id
        })
    }
}

#[async_trait]
impl TaskApi for InMemoryTaskApi {
    async fn list_tasks(&self, user_id: &str) -> ApiResult<Vec<BackendTask>> {
        self.begin(Operation::List).await?;
        Ok(self.records(user_id))
    }

    async fn create_task(&self, user_id: &str, task: &CreateTask) -> ApiResult<BackendTask> {
        self.begin(Operation::Create).await?;
        if task.title.trim().is_empty() {
            return Err(ApiError::Status {
                status: 422,
                detail: "title cannot be empty".into(),
            });
        }
        Ok(self
            .inner
            .lock()
            .insert(user_id, &task.title, task.description.clone(), false))
    }

    async fn update_task(
        &self,
        user_id: &str,
        task_id: &str,
        update: &UpdateTask,
    ) -> ApiResult<BackendTask> {
        self.begin(Operation::Update).await?;
        let mut inner = self.inner.lock();
        let task = inner
            .find_mut(user_id, task_id)
            .ok_or_else(|| ApiError::NotFound(task_id.to_string()))?;
        if let Some(title) = &update.title {
            task.title = title.clone();
        }
        if let Some(description) = &update.description {
            task.description = Some(description.clone());
        }
        task.updated_at = Some(Utc::now());
        Ok(task.clone())
    }

    async fn delete_task(&self, user_id: &str, task_id: &str) -> ApiResult<()> {
        self.begin(Operation::Delete).await?;
        let mut inner = self.inner.lock();
        let before = inner.tasks.len();
        inner.tasks.retain(|task| {
            !(task.user_id.as_deref() == Some(user_id) && task.id.to_string() == task_id)
        });
        if inner.tasks.len() == before {
            return Err(ApiError::NotFound(task_id.to_string()));
        }
        Ok(())
    }

    async fn toggle_task(&self, user_id: &str, task_id: &str) -> ApiResult<BackendTask> {
        self.begin(Operation::Toggle).await?;
        let mut inner = self.inner.lock();
        let task = inner
            .find_mut(user_id, task_id)
            .ok_or_else(|| ApiError::NotFound(task_id.to_string()))?;
        task.completed = !task.completed;
        task.updated_at = Some(Utc::now());
        Ok(task.clone())
    }
}
