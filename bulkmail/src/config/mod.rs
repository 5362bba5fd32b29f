//! Configuration management for bulkmail
//!
//! Configuration is read once at process start from layered sources, with
//! later sources overriding earlier ones:
//!
//! 1. Hardcoded defaults (lowest priority)
//! 2. `./bulkmail.toml`, or an explicit path
//! 3. Environment variables (highest priority, `BULKMAIL_` prefix, `__` for nesting)
//!
//! Environment variable format: `BULKMAIL_SECTION__FIELD_NAME`, for example
//! `BULKMAIL_RELAY__HOST=smtp.example.com`. Sender lists can be given inline:
//! `BULKMAIL_SENDERS='[{address="owner@domain.com",secret="pw"}]'`.
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! port = 3000
//!
//! [relay]
//! host = "smtp.example.com"
//! port = 587
//! secure = false
//!
//! [[senders]]
//! address = "owner@domain.com"
//! secret = "app-password"
//!
//! [[senders]]
//! address = "sales@domain.com"
//! account = "sales-login"
//! secret = "other-password"
//!
//! [fallback]
//! account = "relay-user"
//! secret = "relay-pass"
//! ```

use std::net::SocketAddr;
use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::delivery::{FallbackAccount, SenderBinding};

/// Config file read when no explicit path is given
pub const DEFAULT_CONFIG_FILE: &str = "bulkmail.toml";

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "BULKMAIL_";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source could not be read or did not match the schema
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// No relay host and simulation not requested
    #[error("relay host is not configured; set relay.host, or relay.simulate = true for simulated delivery")]
    RelayNotConfigured,

    /// Both a relay host and simulation were requested
    #[error("relay.host ({0}) and relay.simulate are mutually exclusive")]
    AmbiguousRelay(String),

    /// Listen address could not be parsed
    #[error("invalid listen address {0}")]
    ListenAddress(String),
}

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Interface to bind
    pub host: String,

    /// Port to bind
    pub port: u16,

    /// Whole-request timeout in milliseconds
    pub request_timeout_ms: u64,

    /// Maximum accepted request body
    pub body_limit_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            request_timeout_ms: 30_000,
            body_limit_bytes: 256 * 1024,
        }
    }
}

impl ServerSettings {
    /// Socket address to listen on
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ListenAddress`] if host and port do not form a valid address
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|_| ConfigError::ListenAddress(raw))
    }
}

/// Outbound relay settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Relay hostname; unset means no real relay
    pub host: Option<String>,

    /// Relay port
    pub port: u16,

    /// Implicit TLS (usually port 465)
    pub secure: bool,

    /// Require STARTTLS when `secure` is off
    pub starttls: bool,

    /// Network timeout for relay commands, in milliseconds
    pub timeout_ms: u64,

    /// Explicitly opt in to the simulated relay (requires no host)
    pub simulate: bool,

    /// Delay of a simulated send, in milliseconds
    pub simulated_delay_ms: u64,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            host: None,
            port: 587,
            secure: false,
            starttls: true,
            timeout_ms: 30_000,
            simulate: false,
            simulated_delay_ms: 500,
        }
    }
}

/// Defaults for the message a campaign sends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CampaignSettings {
    /// Base URL of the delivery endpoint
    pub endpoint: String,

    /// Subject line
    pub subject: String,

    /// Plain text body; `{sender}` is replaced with the sender address
    pub text: String,
}

impl Default for CampaignSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:3000".to_string(),
            subject: "Bulk Email Test".to_string(),
            text: "Hello, this is a test email from {sender}.".to_string(),
        }
    }
}

/// Complete bulkmail configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkmailConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerSettings,

    /// Relay settings
    #[serde(default)]
    pub relay: RelaySettings,

    /// Authorized senders, in priority order
    #[serde(default)]
    pub senders: Vec<SenderBinding>,

    /// Generic account for senders without their own binding
    #[serde(default)]
    pub fallback: Option<FallbackAccount>,

    /// Campaign message defaults
    #[serde(default)]
    pub campaign: CampaignSettings,
}

impl BulkmailConfig {
    /// Load from `./bulkmail.toml` and the environment
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if a source is malformed
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load from a specific file and the environment
    ///
    /// A missing file is not an error; defaults and environment still apply.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if a source is malformed
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::figment(path).extract().map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// The layered figment behind [`load_from`](Self::load_from)
    pub fn figment(path: impl AsRef<Path>) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_default_config() {
        let config = BulkmailConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.relay.port, 587);
        assert!(config.relay.host.is_none());
        assert!(!config.relay.simulate);
        assert!(config.senders.is_empty());
        assert_eq!(config.campaign.subject, "Bulk Email Test");
    }

    #[test]
    fn test_listen_addr() {
        let settings = ServerSettings::default();
        assert_eq!(settings.listen_addr().unwrap().port(), 3000);

        let settings = ServerSettings {
            host: "not a host".into(),
            ..ServerSettings::default()
        };
        assert!(settings.listen_addr().is_err());
    }

    #[test]
    fn test_load_from_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "bulkmail.toml",
                r#"
                [relay]
                host = "smtp.example.com"
                port = 465
                secure = true

                [[senders]]
                address = "owner@domain.com"
                secret = "owner-secret"

                [[senders]]
                address = "sales@domain.com"
                account = "sales-login"
                secret = "sales-secret"

                [fallback]
                account = "relay-user"
                secret = "relay-pass"
                "#,
            )?;

            let config = BulkmailConfig::load().expect("config loads");
            assert_eq!(config.relay.host.as_deref(), Some("smtp.example.com"));
            assert_eq!(config.relay.port, 465);
            assert!(config.relay.secure);
            assert_eq!(config.senders.len(), 2);
            assert_eq!(config.senders[1].account.as_deref(), Some("sales-login"));
            assert_eq!(
                config.fallback.as_ref().map(|f| f.account.as_str()),
                Some("relay-user")
            );
            // Untouched sections keep their defaults
            assert_eq!(config.server.port, 3000);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "custom.toml",
                r#"
                [relay]
                host = "smtp.example.com"
                port = 587
                "#,
            )?;
            jail.set_env("BULKMAIL_RELAY__PORT", "2525");
            jail.set_env("BULKMAIL_SERVER__PORT", "8080");

            let config = BulkmailConfig::load_from("custom.toml").expect("config loads");
            assert_eq!(config.relay.port, 2525);
            assert_eq!(config.server.port, 8080);
            assert_eq!(config.relay.host.as_deref(), Some("smtp.example.com"));
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        Jail::expect_with(|_jail| {
            let config = BulkmailConfig::load_from("does-not-exist.toml").expect("config loads");
            assert_eq!(config, BulkmailConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        Jail::expect_with(|jail| {
            jail.create_file("bulkmail.toml", "[relay]\nport = \"not a number\"\n")?;
            assert!(matches!(
                BulkmailConfig::load(),
                Err(ConfigError::Load(_))
            ));
            Ok(())
        });
    }
}
