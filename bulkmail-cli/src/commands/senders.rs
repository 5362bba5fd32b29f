//! `bulkmail senders`

use std::path::PathBuf;

use anyhow::Result;
use bulkmail::delivery::CredentialStore;
use clap::Args;
use console::style;

use super::load_config;

/// Print the authorized sender addresses
#[derive(Debug, Args)]
pub struct SendersCommand {
    /// Configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl SendersCommand {
    /// Execute the command
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded
    pub fn execute(&self) -> Result<()> {
        let config = load_config(self.config.as_deref())?;
        let store = CredentialStore::from_config(&config);

        let senders: Vec<&str> = store.senders().collect();
        if senders.is_empty() {
            println!("{}", style("No senders configured").yellow());
        } else {
            println!("{}", style("Authorized senders:").bold());
            for sender in senders {
                println!("  {sender}");
            }
        }

        if store.has_fallback() {
            println!("{}", style("Unlisted senders use the fallback account").dim());
        }
        Ok(())
    }
}
