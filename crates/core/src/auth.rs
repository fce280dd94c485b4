//! Bearer tokens for the task API.

use async_trait::async_trait;
use reqwest::header::COOKIE;
use serde::Deserialize;

use crate::config::TokenSource;

#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// The token to attach to the next request, if any.
    async fn token(&self) -> Option<String>;
}

pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

pub struct NoToken;

#[async_trait]
impl TokenProvider for NoToken {
    async fn token(&self) -> Option<String> {
        None
    }
}

/// Exchanges the signed-in session for a short-lived token at the bridge endpoint.
pub struct TokenBridge {
    client: reqwest::Client,
    url: String,
    cookie: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    token: Option<String>,
}

impl TokenBridge {
    pub fn new(client: reqwest::Client, url: impl Into<String>, cookie: Option<String>) -> Self {
        Self {
            client,
            url: url.into(),
            cookie,
        }
    }
}

#[async_trait]
impl TokenProvider for TokenBridge {
    async fn token(&self) -> Option<String> {
        let mut request = self.client.get(&self.url);
        if let Some(cookie) = &self.cookie {
            request = request.header(COOKIE, cookie);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(error = %err, "token bridge unreachable");
                return None;
            }
        };
        if !response.status().is_success() {
            tracing::debug!(status = response.status().as_u16(), "token bridge refused session");
            return None;
        }
        match response.json::<BridgeResponse>().await {
            Ok(body) => body.token.filter(|token| !token.is_empty()),
            Err(err) => {
                tracing::debug!(error = %err, "token bridge returned malformed body");
                None
            }
        }
    }
}

pub fn provider_for(source: &TokenSource, client: &reqwest::Client) -> Box<dyn TokenProvider> {
    match source {
        TokenSource::Static(token) => Box::new(StaticToken::new(token.clone())),
        TokenSource::Bridge { url, cookie } => {
            Box::new(TokenBridge::new(client.clone(), url.clone(), cookie.clone()))
        }
        TokenSource::None => Box::new(NoToken),
    }
}
