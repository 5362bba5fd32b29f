//! Relay transport implementations
//!
//! - **SMTP**: authenticates and sends through a real relay via `lettre`
//! - **Simulated**: no network, fixed delay, always succeeds
//!
//! Which one runs is decided once at start-up by [`RelayMode::from_settings`].

pub mod simulated;
pub mod smtp;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::credentials::ResolvedCredential;
use super::message::OutboundMessage;
use crate::config::{ConfigError, RelaySettings};

pub use simulated::SimulatedRelay;
pub use smtp::SmtpRelay;

/// Failures reported by a relay transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// An address could not be parsed
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The message could not be assembled
    #[error("failed to build message: {0}")]
    Message(String),

    /// The relay could not be reached or refused the session
    #[error("relay connection failed: {0}")]
    Connection(String),

    /// The relay rejected the message
    #[error("relay rejected message: {0}")]
    Rejected(String),
}

/// Which relay implementation is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayMode {
    /// Real SMTP relay
    Smtp,
    /// Simulated relay, no network
    Simulated,
}

impl RelayMode {
    /// Decide the relay mode from configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::RelayNotConfigured`] when no host is set and
    /// simulation was not explicitly requested, and
    /// [`ConfigError::AmbiguousRelay`] when both are set.
    pub fn from_settings(settings: &RelaySettings) -> Result<Self, ConfigError> {
        let host = settings.host.as_deref().map(str::trim).filter(|h| !h.is_empty());
        match (host, settings.simulate) {
            (Some(_), false) => Ok(Self::Smtp),
            (None, true) => Ok(Self::Simulated),
            (Some(host), true) => Err(ConfigError::AmbiguousRelay(host.to_string())),
            (None, false) => Err(ConfigError::RelayNotConfigured),
        }
    }

    /// Lowercase name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Smtp => "smtp",
            Self::Simulated => "simulated",
        }
    }
}

impl std::fmt::Display for RelayMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Capability to verify a session with, and send through, an outbound relay
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Establish a session with `credential` and confirm the relay accepts it
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the relay is unreachable or rejects the login
    async fn verify(&self, credential: &ResolvedCredential) -> Result<(), TransportError>;

    /// Transmit one message and return the relay's message identifier
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the message cannot be built or is rejected
    async fn send(
        &self,
        credential: &ResolvedCredential,
        message: &OutboundMessage,
    ) -> Result<String, TransportError>;

    /// The kind of relay behind this transport
    fn mode(&self) -> RelayMode;
}

/// Build the transport selected by `settings`
///
/// # Errors
///
/// Propagates [`RelayMode::from_settings`] failures.
pub fn from_settings(settings: &RelaySettings) -> Result<Arc<dyn RelayTransport>, ConfigError> {
    let transport: Arc<dyn RelayTransport> = match RelayMode::from_settings(settings)? {
        RelayMode::Smtp => Arc::new(SmtpRelay::from_settings(settings)?),
        RelayMode::Simulated => Arc::new(SimulatedRelay::from_settings(settings)),
    };
    Ok(transport)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_smtp_when_host_set() {
        let settings = RelaySettings {
            host: Some("smtp.example.com".into()),
            ..RelaySettings::default()
        };
        assert_eq!(RelayMode::from_settings(&settings).unwrap(), RelayMode::Smtp);
    }

    #[test]
    fn test_mode_simulated_only_when_explicit() {
        let settings = RelaySettings {
            simulate: true,
            ..RelaySettings::default()
        };
        assert_eq!(
            RelayMode::from_settings(&settings).unwrap(),
            RelayMode::Simulated
        );
    }

    #[test]
    fn test_missing_host_is_an_error() {
        let settings = RelaySettings::default();
        assert!(matches!(
            RelayMode::from_settings(&settings),
            Err(ConfigError::RelayNotConfigured)
        ));

        let settings = RelaySettings {
            host: Some("   ".into()),
            ..RelaySettings::default()
        };
        assert!(matches!(
            RelayMode::from_settings(&settings),
            Err(ConfigError::RelayNotConfigured)
        ));
    }

    #[test]
    fn test_host_and_simulate_conflict() {
        let settings = RelaySettings {
            host: Some("smtp.example.com".into()),
            simulate: true,
            ..RelaySettings::default()
        };
        assert!(matches!(
            RelayMode::from_settings(&settings),
            Err(ConfigError::AmbiguousRelay(_))
        ));
    }
}
