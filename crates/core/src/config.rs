use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use directories::{BaseDirs, ProjectDirs};
use once_cell::sync::Lazy;

static DEFAULT_DB_NAME: &str = "taskflow.sqlite3";
static DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

static ENV_DATA_DIR: &str = "TASKFLOW_DATA_DIR";
static ENV_API_URL: &str = "TASKFLOW_API_URL";
static ENV_USER_ID: &str = "TASKFLOW_USER_ID";
static ENV_TOKEN: &str = "TASKFLOW_TOKEN";
static ENV_TOKEN_BRIDGE_URL: &str = "TASKFLOW_TOKEN_BRIDGE_URL";
static ENV_SESSION_COOKIE: &str = "TASKFLOW_SESSION_COOKIE";
static ENV_HTTP_TIMEOUT: &str = "TASKFLOW_HTTP_TIMEOUT_SECS";

static PROJECT_DIRS: Lazy<Option<ProjectDirs>> =
    Lazy::new(|| ProjectDirs::from("dev", "taskflow", "taskflow"));

/// How outgoing requests obtain their bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    /// A pre-issued token, sent as-is.
    Static(String),
    /// Exchange the session cookie at the token bridge on every request.
    Bridge { url: String, cookie: Option<String> },
    /// No token; requests go out unauthenticated.
    None,
}

/// Values supplied on the command line that take precedence over the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_dir: Option<PathBuf>,
    pub api_url: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    data_dir: PathBuf,
    db_path: PathBuf,
    api_url: String,
    user_id: Option<String>,
    token: TokenSource,
    http_timeout: Duration,
}

impl AppConfig {
    /// Construct [`AppConfig`] by resolving every setting from the provided overrides,
    /// environment variables, and platform defaults.
    pub fn discover(overrides: ConfigOverrides) -> Result<Self> {
        let data_dir = resolve_data_dir(overrides.data_dir)?;
        if !data_dir.exists() {
            fs::create_dir_all(&data_dir).with_context(|| {
                format!("Failed to create data directory at {}", data_dir.display())
            })?;
        }

        let mut config = Self::from_data_dir(data_dir)?;
        if let Some(url) = overrides.api_url.or_else(|| non_empty_env(ENV_API_URL)) {
            config.api_url = normalize_api_url(&url)?;
        }
        config.user_id = overrides.user_id.or_else(|| non_empty_env(ENV_USER_ID));
        config.token = resolve_token_source();
        if let Some(raw) = non_empty_env(ENV_HTTP_TIMEOUT) {
            let secs: u64 = raw
                .parse()
                .with_context(|| format!("{ENV_HTTP_TIMEOUT} must be a whole number of seconds"))?;
            config.http_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    /// Construct [`AppConfig`] directly from a resolved data directory, with no session.
    pub fn from_data_dir(data_dir: PathBuf) -> Result<Self> {
        let db_path = data_dir.join(DEFAULT_DB_NAME);
        Ok(Self {
            data_dir,
            db_path,
            api_url: DEFAULT_API_URL.to_string(),
            user_id: None,
            token: TokenSource::None,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        })
    }

    pub fn with_session(mut self, user_id: impl Into<String>, token: TokenSource) -> Self {
        self.user_id = Some(user_id.into());
        self.token = token;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn token(&self) -> &TokenSource {
        &self.token
    }

    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
    }

    /// A session exists when a user id is known; the token is checked by the backend.
    pub fn has_session(&self) -> bool {
        self.user_id.is_some()
    }
}

fn resolve_data_dir(data_dir_override: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = data_dir_override {
        return Ok(dir);
    }

    if let Ok(env_dir) = env::var(ENV_DATA_DIR) {
        return Ok(PathBuf::from(env_dir));
    }

    if cfg!(debug_assertions) {
        let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        let dev_dir = manifest_dir.join("..").join("tmp").join("dev-taskflow");
        return Ok(dev_dir);
    }

    if let Some(project) = &*PROJECT_DIRS {
        return Ok(project.data_dir().to_path_buf());
    }

    if let Some(base) = BaseDirs::new() {
        return Ok(base.home_dir().join(".taskflow"));
    }

    Ok(env::current_dir()?.join(".taskflow"))
}

fn resolve_token_source() -> TokenSource {
    if let Some(token) = non_empty_env(ENV_TOKEN) {
        return TokenSource::Static(token);
    }
    if let Some(url) = non_empty_env(ENV_TOKEN_BRIDGE_URL) {
        return TokenSource::Bridge {
            url,
            cookie: non_empty_env(ENV_SESSION_COOKIE),
        };
    }
    TokenSource::None
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn normalize_api_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(anyhow!(
            "API URL '{}' must start with http:// or https://",
            raw
        ));
    }
    Ok(trimmed.to_string())
}
