//! Wire types for `POST /send`

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{DeliveryError, DeliveryErrorKind};

/// Body of a send request as received
///
/// Every field is optional on the wire so that a missing `to` or `from`
/// surfaces as `InvalidRequest` rather than a deserialization failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct SendRequest {
    /// Recipient address
    #[validate(required, length(min = 1))]
    pub to: Option<String>,

    /// Claimed sender address
    #[validate(required, length(min = 1))]
    pub from: Option<String>,

    /// Subject line
    pub subject: Option<String>,

    /// Plain text body
    #[serde(alias = "body")]
    pub text: Option<String>,

    /// Optional HTML body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

impl SendRequest {
    /// Build a plain-text request
    pub fn new(
        to: impl Into<String>,
        from: impl Into<String>,
        subject: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            to: Some(to.into()),
            from: Some(from.into()),
            subject: Some(subject.into()),
            text: Some(text.into()),
            html: None,
        }
    }

    /// Check required fields and produce the validated form
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::InvalidRequest`] when `to` or `from` is absent,
    /// empty, or whitespace only.
    pub fn validated(self) -> Result<ValidatedRequest, DeliveryError> {
        self.validate().map_err(|_| DeliveryError::missing_fields())?;

        let (Some(to), Some(from)) = (self.to, self.from) else {
            return Err(DeliveryError::missing_fields());
        };
        if to.trim().is_empty() || from.trim().is_empty() {
            return Err(DeliveryError::missing_fields());
        }

        Ok(ValidatedRequest {
            to: to.trim().to_string(),
            from,
            subject: self.subject.unwrap_or_default(),
            text: self.text.unwrap_or_default(),
            html: self.html,
        })
    }
}

/// A send request whose required fields are known to be present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    /// Recipient address, trimmed
    pub to: String,
    /// Claimed sender, as supplied
    pub from: String,
    /// Subject line
    pub subject: String,
    /// Plain text body
    pub text: String,
    /// Optional HTML body
    pub html: Option<String>,
}

/// Successful outcome of one delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Message identifier supplied by the relay
    pub id: String,
    /// Address the message was sent as
    pub identity: String,
    /// Whether the simulated relay handled the send
    pub simulated: bool,
}

/// JSON body of every `/send` reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResponse {
    /// Whether the message was handed to the relay
    pub success: bool,

    /// Relay message identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Human-readable summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Diagnostic detail for server-side failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Failure kind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<DeliveryErrorKind>,
}

impl SendResponse {
    /// Reply for a delivered message
    #[must_use]
    pub fn sent(receipt: &DeliveryReceipt) -> Self {
        let message = if receipt.simulated {
            "Email sent (simulated)"
        } else {
            "Email sent"
        };

        Self {
            success: true,
            id: Some(receipt.id.clone()),
            message: Some(message.to_string()),
            error: None,
            kind: None,
        }
    }

    /// Reply for a failed delivery
    #[must_use]
    pub fn failure(err: &DeliveryError) -> Self {
        Self {
            success: false,
            id: None,
            message: Some(err.to_string()),
            error: err.detail(),
            kind: Some(err.kind()),
        }
    }
}
