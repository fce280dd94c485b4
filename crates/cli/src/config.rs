pub use taskflow_core::config::*;

use crate::cli::Cli;

pub fn from_cli(cli: &Cli) -> anyhow::Result<AppConfig> {
    AppConfig::discover(ConfigOverrides {
        data_dir: cli.data_dir.clone(),
        api_url: cli.api_url.clone(),
        user_id: cli.user_id.clone(),
    })
}
