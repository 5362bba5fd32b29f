//! Delivery error taxonomy
//!
//! Every way a single send can fail, as seen by both sides of the `/send`
//! endpoint. The server produces the first five kinds; `Cancelled` and
//! `EndpointUnreachable` only ever originate in the dispatching client.

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::delivery::SendResponse;

/// Message returned when `to` or `from` is absent
pub const MISSING_FIELDS_MESSAGE: &str = "Missing required fields: to, from";

/// Discriminant of a [`DeliveryError`], stable on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryErrorKind {
    /// The request was malformed or missing required fields
    InvalidRequest,
    /// The claimed sender has no credential binding
    Unauthorized,
    /// A binding matched but its secret is empty
    CredentialMisconfigured,
    /// The relay rejected the connection or the credentials
    AuthenticationFailed,
    /// The relay accepted the session but the transmission failed
    DeliveryFailed,
    /// The operator aborted the call
    Cancelled,
    /// The delivery endpoint itself could not be reached or answered garbage
    EndpointUnreachable,
}

impl DeliveryErrorKind {
    /// HTTP status the endpoint uses for this kind
    #[must_use]
    pub const fn status_code(self) -> StatusCode {
        match self {
            Self::InvalidRequest => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::CredentialMisconfigured
            | Self::AuthenticationFailed
            | Self::DeliveryFailed
            | Self::Cancelled
            | Self::EndpointUnreachable => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short lowercase name used in logs and CLI output
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::Unauthorized => "unauthorized",
            Self::CredentialMisconfigured => "credential_misconfigured",
            Self::AuthenticationFailed => "authentication_failed",
            Self::DeliveryFailed => "delivery_failed",
            Self::Cancelled => "cancelled",
            Self::EndpointUnreachable => "endpoint_unreachable",
        }
    }
}

impl std::fmt::Display for DeliveryErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Failure of one delivery attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Caller error (400)
    #[error("{message}")]
    InvalidRequest {
        /// Human-readable reason
        message: String,
    },

    /// Sender not recognized (401)
    #[error("Unauthorized sender: {sender} is not a configured sender")]
    Unauthorized {
        /// The claimed sender address, trimmed
        sender: String,
    },

    /// Binding found without a usable secret (500)
    #[error("Server configuration error: no secret configured for {sender}")]
    CredentialMisconfigured {
        /// The matched sender address
        sender: String,
    },

    /// Relay verification failed (500)
    #[error("Relay authentication failed")]
    AuthenticationFailed {
        /// Relay-supplied detail
        detail: String,
    },

    /// Relay transmission failed (500)
    #[error("Error sending email")]
    DeliveryFailed {
        /// Relay-supplied detail
        detail: String,
    },

    /// Aborted by the operator before a response arrived
    #[error("Delivery cancelled")]
    Cancelled,

    /// The endpoint could not be reached or its reply was unreadable
    #[error("Delivery endpoint unreachable: {detail}")]
    Endpoint {
        /// Transport-level detail
        detail: String,
    },
}

impl DeliveryError {
    /// Request missing `to` or `from`
    #[must_use]
    pub fn missing_fields() -> Self {
        Self::InvalidRequest {
            message: MISSING_FIELDS_MESSAGE.to_string(),
        }
    }

    /// Request body could not be parsed
    #[must_use]
    pub fn invalid_body<T: std::fmt::Display>(reason: T) -> Self {
        Self::InvalidRequest {
            message: format!("Invalid request body: {reason}"),
        }
    }

    /// Endpoint-level failure on the client side
    #[must_use]
    pub fn endpoint<T: Into<String>>(detail: T) -> Self {
        Self::Endpoint {
            detail: detail.into(),
        }
    }

    /// The kind of this error
    #[must_use]
    pub const fn kind(&self) -> DeliveryErrorKind {
        match self {
            Self::InvalidRequest { .. } => DeliveryErrorKind::InvalidRequest,
            Self::Unauthorized { .. } => DeliveryErrorKind::Unauthorized,
            Self::CredentialMisconfigured { .. } => DeliveryErrorKind::CredentialMisconfigured,
            Self::AuthenticationFailed { .. } => DeliveryErrorKind::AuthenticationFailed,
            Self::DeliveryFailed { .. } => DeliveryErrorKind::DeliveryFailed,
            Self::Cancelled => DeliveryErrorKind::Cancelled,
            Self::Endpoint { .. } => DeliveryErrorKind::EndpointUnreachable,
        }
    }

    /// Diagnostic detail reported in the `error` field of a 500 body
    #[must_use]
    pub fn detail(&self) -> Option<String> {
        match self {
            Self::InvalidRequest { .. } | Self::Unauthorized { .. } | Self::Cancelled => None,
            Self::CredentialMisconfigured { sender } => {
                Some(format!("missing secret for sender {sender}"))
            }
            Self::AuthenticationFailed { detail }
            | Self::DeliveryFailed { detail }
            | Self::Endpoint { detail } => Some(detail.clone()),
        }
    }

    /// HTTP status for this error
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        self.kind().status_code()
    }

    /// Rebuild an error from a non-success endpoint reply
    ///
    /// Uses the `kind` field when the server sent one and falls back to the
    /// status code otherwise.
    #[must_use]
    pub fn from_reply(status: StatusCode, reply: &SendResponse) -> Self {
        let message = reply
            .message
            .clone()
            .unwrap_or_else(|| format!("endpoint returned {status}"));
        let detail = reply.error.clone().unwrap_or_else(|| message.clone());

        let kind = reply.kind.unwrap_or(match status {
            StatusCode::BAD_REQUEST => DeliveryErrorKind::InvalidRequest,
            StatusCode::UNAUTHORIZED => DeliveryErrorKind::Unauthorized,
            _ => DeliveryErrorKind::DeliveryFailed,
        });

        match kind {
            DeliveryErrorKind::InvalidRequest => Self::InvalidRequest { message },
            DeliveryErrorKind::Unauthorized => Self::Unauthorized {
                sender: strip_affixes(&message, "Unauthorized sender: ", " is not a configured sender"),
            },
            DeliveryErrorKind::CredentialMisconfigured => Self::CredentialMisconfigured {
                sender: strip_affixes(&detail, "missing secret for sender ", ""),
            },
            DeliveryErrorKind::AuthenticationFailed => Self::AuthenticationFailed { detail },
            DeliveryErrorKind::DeliveryFailed => Self::DeliveryFailed { detail },
            DeliveryErrorKind::Cancelled => Self::Cancelled,
            DeliveryErrorKind::EndpointUnreachable => Self::Endpoint { detail },
        }
    }
}

// Recover the sender from text this module rendered on the server side
fn strip_affixes(text: &str, prefix: &str, suffix: &str) -> String {
    let inner = text.strip_prefix(prefix).unwrap_or(text);
    inner.strip_suffix(suffix).unwrap_or(inner).to_string()
}

impl IntoResponse for DeliveryError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(SendResponse::failure(&self))).into_response()
    }
}
