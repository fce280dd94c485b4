//! Client side of the per-user task REST API.

mod http;
mod memory;
#[cfg(test)]
pub(crate) mod stub;

use async_trait::async_trait;

use crate::error::ApiResult;
use crate::model::{BackendTask, CreateTask, UpdateTask};

pub use http::HttpTaskApi;
pub use memory::{InMemoryTaskApi, Operation};

/// The five task operations the backend exposes for a user.
#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn list_tasks(&self, user_id: &str) -> ApiResult<Vec<BackendTask>>;

    async fn create_task(&self, user_id: &str, task: &CreateTask) -> ApiResult<BackendTask>;

    async fn update_task(
        &self,
        user_id: &str,
        task_id: &str,
        update: &UpdateTask,
    ) -> ApiResult<BackendTask>;

    async fn delete_task(&self, user_id: &str, task_id: &str) -> ApiResult<()>;

    async fn toggle_task(&self, user_id: &str, task_id: &str) -> ApiResult<BackendTask>;
}
