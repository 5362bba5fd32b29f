//! Simulated relay for demos and local development
//!
//! Logs the message instead of sending it and succeeds after a fixed delay.
//! Only selected when configuration explicitly asks for it.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use super::{RelayMode, RelayTransport, TransportError};
use crate::config::RelaySettings;
use crate::delivery::credentials::ResolvedCredential;
use crate::delivery::message::OutboundMessage;

/// Default delay before a simulated send completes
pub const DEFAULT_SIMULATED_DELAY: Duration = Duration::from_millis(500);

/// Relay that never touches the network
#[derive(Debug, Clone)]
pub struct SimulatedRelay {
    delay: Duration,
}

impl Default for SimulatedRelay {
    fn default() -> Self {
        Self::new(DEFAULT_SIMULATED_DELAY)
    }
}

impl SimulatedRelay {
    /// Create a simulated relay with the given send delay
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Create a simulated relay from loaded settings
    #[must_use]
    pub const fn from_settings(settings: &RelaySettings) -> Self {
        Self::new(Duration::from_millis(settings.simulated_delay_ms))
    }

    /// Configured send delay
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }
}

#[async_trait]
impl RelayTransport for SimulatedRelay {
    async fn verify(&self, credential: &ResolvedCredential) -> Result<(), TransportError> {
        debug!(account = %credential.account, "simulated relay session verified");
        Ok(())
    }

    async fn send(
        &self,
        _credential: &ResolvedCredential,
        message: &OutboundMessage,
    ) -> Result<String, TransportError> {
        info!(
            from = %message.from,
            to = %message.to,
            subject = %message.subject,
            "simulated send"
        );

        tokio::time::sleep(self.delay).await;

        Ok(format!("<{}@simulated.invalid>", Uuid::new_v4()))
    }

    fn mode(&self) -> RelayMode {
        RelayMode::Simulated
    }
}
