mod tools;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use pmcp::types::capabilities::ServerCapabilities;
use pmcp::Server;
use taskflow_core::config::{AppConfig, ConfigOverrides};
use taskflow_core::services::TasksService;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

pub use tools::TOOL_NAMES;

/// Runtime configuration for the TaskFlow MCP server.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    pub data_dir: Option<PathBuf>,
    pub api_url: Option<String>,
    pub user_id: Option<String>,
    pub log_filter: Option<String>,
}

/// Launch the MCP server using the provided configuration.
pub async fn run_server(config: ServerConfig) -> Result<()> {
    init_tracing(config.log_filter.clone())?;

    let app_config = AppConfig::discover(ConfigOverrides {
        data_dir: config.data_dir.clone(),
        api_url: config.api_url.clone(),
        user_id: config.user_id.clone(),
    })
    .context("failed to resolve configuration")?;
    if !app_config.has_session() {
        tracing::warn!("no user configured; add_task will be refused and other tools see no tasks");
    }
    let tasks_service = Arc::new(
        TasksService::new(app_config.clone()).context("failed to initialize task service")?,
    );

    let server = build_server(tasks_service).context("failed to build MCP server")?;

    eprintln!(
        "Starting taskflow-mcp v{} (api: {}, data dir: {}) with tools: {}",
        env!("CARGO_PKG_VERSION"),
        app_config.api_url(),
        app_config.data_dir().display(),
        TOOL_NAMES.join(", ")
    );

    server
        .run_stdio()
        .await
        .map_err(|err| anyhow::anyhow!("MCP server error: {}", err))
}

/// Run the MCP server by creating an internal Tokio runtime.
pub fn run_server_blocking(config: ServerConfig) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    runtime.block_on(run_server(config))
}

/// Logs go to stderr; stdout carries the protocol.
fn init_tracing(filter: Option<String>) -> Result<()> {
    let filter = filter.unwrap_or_else(|| "info".to_string());
    let directive: Directive = filter.parse()?;
    let env_filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
    Ok(())
}

fn build_server(service: Arc<TasksService>) -> Result<Server> {
    let builder = Server::builder()
        .name("taskflow-mcp")
        .version(env!("CARGO_PKG_VERSION"))
        .capabilities(ServerCapabilities::tools_only());

    let builder = tools::register(builder, service);
    builder
        .build()
        .map_err(|err| anyhow::anyhow!(err.to_string()))
}
