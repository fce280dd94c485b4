use anyhow::{Context, Result};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVE: &str = "warn";

/// Install the stderr subscriber. `RUST_LOG` adds to the default directive.
pub fn init_tracing(filter: Option<&str>) -> Result<()> {
    let filter = filter.unwrap_or(DEFAULT_DIRECTIVE);
    let directive: Directive = filter
        .parse()
        .with_context(|| format!("Invalid log directive '{filter}'"))?;
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
