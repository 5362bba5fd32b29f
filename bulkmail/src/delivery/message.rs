//! Outbound message handed to a relay
//!
//! Provides a small builder for the message a relay transmits. The `From`
//! address is always the authenticated identity; a caller-supplied display
//! name is preserved in front of it.

use serde::{Deserialize, Serialize};

use super::credentials::{ClaimedSender, ResolvedCredential};
use super::request::ValidatedRequest;

/// A single message ready for transmission
///
/// ```rust
/// use bulkmail::delivery::OutboundMessage;
///
/// let message = OutboundMessage::new()
///     .to("user@example.com")
///     .from("owner@domain.com")
///     .subject("Hello")
///     .text("Hello, World!");
/// assert_eq!(message.to, "user@example.com");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Recipient address
    pub to: String,

    /// Authenticated sender address
    pub from: String,

    /// Display name shown with the sender address
    pub from_name: Option<String>,

    /// Subject line
    pub subject: String,

    /// Plain text body
    pub text: Option<String>,

    /// HTML body
    pub html: Option<String>,
}

impl OutboundMessage {
    /// Create an empty message
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the message for a validated request sent under `credential`
    #[must_use]
    pub fn for_request(request: &ValidatedRequest, credential: &ResolvedCredential) -> Self {
        let claimed = ClaimedSender::parse(&request.from);

        let mut message = Self::new()
            .to(&request.to)
            .from(&credential.identity)
            .subject(&request.subject)
            .text(&request.text);
        message.from_name = claimed.name;
        if let Some(html) = &request.html {
            message = message.html(html);
        }
        message
    }

    /// Set the recipient
    #[must_use]
    pub fn to(mut self, address: &str) -> Self {
        self.to = address.to_string();
        self
    }

    /// Set the sender address
    #[must_use]
    pub fn from(mut self, address: &str) -> Self {
        self.from = address.to_string();
        self
    }

    /// Set the sender display name
    #[must_use]
    pub fn from_name(mut self, name: &str) -> Self {
        self.from_name = Some(name.to_string());
        self
    }

    /// Set the subject
    #[must_use]
    pub fn subject(mut self, subject: &str) -> Self {
        self.subject = subject.to_string();
        self
    }

    /// Set the plain text body
    #[must_use]
    pub fn text(mut self, body: &str) -> Self {
        self.text = Some(body.to_string());
        self
    }

    /// Set the HTML body
    #[must_use]
    pub fn html(mut self, body: &str) -> Self {
        self.html = Some(body.to_string());
        self
    }

    /// Domain part of the sender address, used for generated message ids
    #[must_use]
    pub fn sender_domain(&self) -> &str {
        self.from
            .rsplit_once('@')
            .map(|(_, domain)| domain)
            .filter(|domain| !domain.is_empty())
            .unwrap_or("localhost")
    }
}
