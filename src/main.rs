use anyhow::{Context, Result};
use clap::Parser;

fn main() -> Result<()> {
    let cli = taskflow::cli::Cli::parse();

    match cli.command.clone() {
        Some(taskflow::cli::CliCommand::Mcp) => {
            let config = taskflow::mcp::ServerConfig {
                data_dir: cli.data_dir.clone(),
                api_url: cli.api_url.clone(),
                user_id: cli.user_id.clone(),
                log_filter: cli.log_filter.clone(),
            };
            taskflow::mcp::run_server_blocking(config)?;
        }
        command => {
            taskflow::logging::init_tracing(cli.log_filter.as_deref())?;
            let command = command.unwrap_or_else(|| {
                taskflow::cli::CliCommand::List(taskflow::cli::ListArgs::default())
            });
            let config = taskflow::config::from_cli(&cli)?;
            let service = taskflow::core::TasksService::new(config)?;

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("failed to build tokio runtime")?;
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            runtime.block_on(taskflow::commands::execute(
                &service,
                command,
                taskflow::core::dates::local_today(),
                &mut handle,
            ))?;
        }
    }

    Ok(())
}
