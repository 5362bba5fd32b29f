//! Application state shared by the HTTP handlers
//!
//! Built once at start-up from [`BulkmailConfig`]. Nothing in here is
//! mutated after construction.

use std::sync::Arc;

use crate::config::{BulkmailConfig, ConfigError};
use crate::delivery::{transport, CredentialStore, DeliveryService, RelayTransport};

/// State handed to every handler
///
/// # Example
///
/// ```rust
/// use bulkmail::state::AppState;
/// use bulkmail::testing::config_with_sender;
///
/// # fn example() -> anyhow::Result<()> {
/// let state = AppState::from_config(config_with_sender("owner@domain.com", "pw"))?;
/// assert_eq!(state.delivery().relay_mode().name(), "simulated");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AppState {
    config: Arc<BulkmailConfig>,
    delivery: DeliveryService,
}

impl AppState {
    /// Build state, choosing the relay from `config.relay`
    ///
    /// # Errors
    ///
    /// Fails when the relay settings select no usable transport
    pub fn from_config(config: BulkmailConfig) -> Result<Self, ConfigError> {
        let transport = transport::from_settings(&config.relay)?;
        Ok(Self::new(config, transport))
    }

    /// Build state around an explicit relay transport
    #[must_use]
    pub fn new(config: BulkmailConfig, transport: Arc<dyn RelayTransport>) -> Self {
        let credentials = Arc::new(CredentialStore::from_config(&config));
        Self {
            config: Arc::new(config),
            delivery: DeliveryService::new(credentials, transport),
        }
    }

    /// Loaded configuration
    #[must_use]
    pub fn config(&self) -> &BulkmailConfig {
        &self.config
    }

    /// The `/send` request handler
    #[must_use]
    pub const fn delivery(&self) -> &DeliveryService {
        &self.delivery
    }
}
