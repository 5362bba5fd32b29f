//! SMTP relay transport
//!
//! Uses the `lettre` crate. A transport is built per request from the resolved
//! credential so that each sender authenticates as itself.

use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    message::{header, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::debug;
use uuid::Uuid;

use super::{RelayMode, RelayTransport, TransportError};
use crate::config::{ConfigError, RelaySettings};
use crate::delivery::credentials::ResolvedCredential;
use crate::delivery::message::OutboundMessage;

/// Connection parameters for an SMTP relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpRelayConfig {
    /// Relay hostname
    pub host: String,

    /// Relay port (587 for STARTTLS, 465 for implicit TLS)
    pub port: u16,

    /// Implicit TLS from the first byte
    pub secure: bool,

    /// Require STARTTLS when `secure` is off; plaintext otherwise
    pub starttls: bool,

    /// Per-command network timeout
    pub timeout: Duration,
}

/// Relay that authenticates and sends over SMTP
#[derive(Debug, Clone)]
pub struct SmtpRelay {
    config: SmtpRelayConfig,
}

impl SmtpRelay {
    /// Create a relay with explicit parameters
    #[must_use]
    pub const fn new(config: SmtpRelayConfig) -> Self {
        Self { config }
    }

    /// Create a relay from loaded settings
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::RelayNotConfigured`] if no host is set
    pub fn from_settings(settings: &RelaySettings) -> Result<Self, ConfigError> {
        let host = settings
            .host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or(ConfigError::RelayNotConfigured)?;

        Ok(Self::new(SmtpRelayConfig {
            host: host.to_string(),
            port: settings.port,
            secure: settings.secure,
            starttls: settings.starttls,
            timeout: Duration::from_millis(settings.timeout_ms),
        }))
    }

    /// Relay connection parameters
    #[must_use]
    pub const fn config(&self) -> &SmtpRelayConfig {
        &self.config
    }

    fn transport(
        &self,
        credential: &ResolvedCredential,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, TransportError> {
        let credentials = Credentials::new(
            credential.account.clone(),
            credential.secret.expose().to_string(),
        );

        let builder = if self.config.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.host)
                .map_err(|e| TransportError::Connection(format!("TLS parameters error: {e}")))?
        } else if self.config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
                .map_err(|e| TransportError::Connection(format!("TLS parameters error: {e}")))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.host)
        };

        Ok(builder
            .port(self.config.port)
            .timeout(Some(self.config.timeout))
            .credentials(credentials)
            .build())
    }

    /// Build the lettre message and the id it carries
    fn build_message(message: &OutboundMessage) -> Result<(Message, String), TransportError> {
        let from_address: Address = message
            .from
            .parse()
            .map_err(|_| TransportError::InvalidAddress(message.from.clone()))?;
        let from = Mailbox::new(message.from_name.clone(), from_address);

        let to: Mailbox = message
            .to
            .parse()
            .map_err(|_| TransportError::InvalidAddress(message.to.clone()))?;

        let message_id = format!("<{}@{}>", Uuid::new_v4(), message.sender_domain());

        let builder = Message::builder()
            .from(from)
            .to(to)
            .subject(message.subject.clone())
            .message_id(Some(message_id.clone()));

        let text = message.text.clone().unwrap_or_default();
        let built = if let Some(html) = &message.html {
            builder.multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_PLAIN)
                            .body(text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_HTML)
                            .body(html.clone()),
                    ),
            )
        } else {
            builder.header(header::ContentType::TEXT_PLAIN).body(text)
        };

        let built = built.map_err(|e| TransportError::Message(e.to_string()))?;
        Ok((built, message_id))
    }
}

#[async_trait]
impl RelayTransport for SmtpRelay {
    async fn verify(&self, credential: &ResolvedCredential) -> Result<(), TransportError> {
        let transport = self.transport(credential)?;

        match transport.test_connection().await {
            Ok(true) => {
                debug!(host = %self.config.host, account = %credential.account, "relay session verified");
                Ok(())
            }
            Ok(false) => Err(TransportError::Connection(format!(
                "relay {} did not accept the session",
                self.config.host
            ))),
            Err(e) => Err(TransportError::Connection(e.to_string())),
        }
    }

    async fn send(
        &self,
        credential: &ResolvedCredential,
        message: &OutboundMessage,
    ) -> Result<String, TransportError> {
        let (email, message_id) = Self::build_message(message)?;
        let transport = self.transport(credential)?;

        let response = transport
            .send(email)
            .await
            .map_err(|e| TransportError::Rejected(e.to_string()))?;

        debug!(code = %response.code(), id = %message_id, "relay accepted message");
        Ok(message_id)
    }

    fn mode(&self) -> RelayMode {
        RelayMode::Smtp
    }
}
