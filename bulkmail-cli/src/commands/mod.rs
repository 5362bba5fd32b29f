//! CLI command implementations

pub mod send;
pub mod senders;
pub mod serve;

pub use send::SendCommand;
pub use senders::SendersCommand;
pub use serve::ServeCommand;

use std::path::Path;

use anyhow::{Context, Result};
use bulkmail::config::{BulkmailConfig, DEFAULT_CONFIG_FILE};

/// Load configuration from `path`, or `./bulkmail.toml` when unset
fn load_config(path: Option<&Path>) -> Result<BulkmailConfig> {
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    BulkmailConfig::load_from(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}
