use std::path::PathBuf;

use clap::Parser;
use taskflow_mcp::{run_server, ServerConfig};

#[derive(Parser, Debug)]
#[command(
    name = "taskflow-mcp",
    version,
    about = "Model Context Protocol server exposing TaskFlow tasks to chat assistants"
)]
struct Args {
    /// Override the data directory (defaults to the same resolution as the CLI)
    #[arg(long = "data-dir", value_name = "PATH")]
    data_dir: Option<PathBuf>,

    /// Base URL of the task API
    #[arg(long = "api-url", value_name = "URL")]
    api_url: Option<String>,

    /// User whose tasks the tools act on
    #[arg(long = "user", value_name = "ID")]
    user_id: Option<String>,

    /// Override the tracing filter (e.g. "info", "debug", or full directives)
    #[arg(long = "log", value_name = "DIRECTIVE")]
    log_filter: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = ServerConfig {
        data_dir: args.data_dir,
        api_url: args.api_url,
        user_id: args.user_id,
        log_filter: args.log_filter,
    };

    run_server(config).await
}
