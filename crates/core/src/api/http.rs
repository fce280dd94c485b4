use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::TaskApi;
use crate::auth::{provider_for, TokenProvider};
use crate::config::AppConfig;
use crate::error::{ApiError, ApiResult};
use crate::model::{BackendTask, CreateTask, UpdateTask};

/// [`TaskApi`] over HTTP, attaching a bearer token to every request.
pub struct HttpTaskApi {
    client: Client,
    base_url: Url,
    tokens: Box<dyn TokenProvider>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<Value>,
}

impl HttpTaskApi {
    pub fn new(client: Client, base_url: &str, tokens: Box<dyn TokenProvider>) -> ApiResult<Self> {
        let base_url =
            Url::parse(base_url).map_err(|err| ApiError::InvalidUrl(format!("{base_url}: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            client,
            base_url,
            tokens,
        })
    }

    pub fn from_config(config: &AppConfig) -> ApiResult<Self> {
        let client = Client::builder().timeout(config.http_timeout()).build()?;
        let tokens = provider_for(config.token(), &client);
        Self::new(client, config.api_url(), tokens)
    }

    pub(crate) fn tasks_url(&self, user_id: &str) -> Url {
        self.url_for(&["api", user_id, "tasks"])
    }

    pub(crate) fn task_url(&self, user_id: &str, task_id: &str) -> Url {
        self.url_for(&["api", user_id, "tasks", task_id])
    }

    pub(crate) fn complete_url(&self, user_id: &str, task_id: &str) -> Url {
        self.url_for(&["api", user_id, "tasks", task_id, "complete"])
    }

    fn url_for(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(&self, request: RequestBuilder) -> ApiResult<Response> {
        let mut request = request
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json");
        if let Some(token) = self.tokens.token().await {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status {
            status: status.as_u16(),
            detail: error_detail(status, &body),
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|err| ApiError::Decode(err.to_string()))
    }
}

/// Pull the `detail` out of an error body, falling back to the status line.
fn error_detail(status: StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.detail)
        .map(|detail| match detail {
            Value::String(text) => text,
            other => other.to_string(),
        });
    detail.unwrap_or_else(|| match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => format!("HTTP {}", status.as_u16()),
    })
}

#[async_trait]
impl TaskApi for HttpTaskApi {
    async fn list_tasks(&self, user_id: &str) -> ApiResult<Vec<BackendTask>> {
        let response = self.send(self.client.get(self.tasks_url(user_id))).await?;
        Self::decode(response).await
    }

    async fn create_task(&self, user_id: &str, task: &CreateTask) -> ApiResult<BackendTask> {
        let request = self.client.post(self.tasks_url(user_id)).json(task);
        let response = self.send(request).await?;
        Self::decode(response).await
    }

    async fn update_task(
        &self,
        user_id: &str,
        task_id: &str,
        update: &UpdateTask,
    ) -> ApiResult<BackendTask> {
        let request = self.client.put(self.task_url(user_id, task_id)).json(update);
        let response = self.send(request).await?;
        Self::decode(response).await
    }

    async fn delete_task(&self, user_id: &str, task_id: &str) -> ApiResult<()> {
        self.send(self.client.delete(self.task_url(user_id, task_id)))
            .await?;
        Ok(())
    }

    async fn toggle_task(&self, user_id: &str, task_id: &str) -> ApiResult<BackendTask> {
        let request = self.client.patch(self.complete_url(user_id, task_id));
        let response = self.send(request).await?;
        Self::decode(response).await
    }
}
