//! `bulkmail serve`

use std::path::PathBuf;

use anyhow::Result;
use bulkmail::observability::{self, ObservabilityConfig};
use clap::Args;
use console::style;

use super::load_config;

/// Run the delivery endpoint until Ctrl-C
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl ServeCommand {
    /// Execute the command
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid or the server fails
    pub async fn execute(&self, log_json: bool) -> Result<()> {
        let config = load_config(self.config.as_deref())?;
        observability::init_with(&ObservabilityConfig::new("bulkmail").with_json(log_json))?;

        if !log_json {
            println!(
                "{} {}",
                style("Starting").green().bold(),
                style(format!(
                    "delivery endpoint on {}:{}",
                    config.server.host, config.server.port
                ))
                .bold()
            );
        }

        bulkmail::server::serve(config).await
    }
}
