//! Staged request handling for one send

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::credentials::CredentialStore;
use super::message::OutboundMessage;
use super::request::{DeliveryReceipt, SendRequest};
use super::transport::{RelayMode, RelayTransport};
use crate::error::{DeliveryError, DeliveryErrorKind};

/// Progress of one request through the endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStage {
    /// Body parsed, nothing checked yet
    Received,
    /// `to` and `from` present
    Validated,
    /// Sender mapped to relay credentials
    CredentialResolved,
    /// Relay session established and authenticated
    TransportVerified,
    /// Relay accepted the message
    Sent,
    /// Terminal failure
    Failed(DeliveryErrorKind),
}

impl DeliveryStage {
    /// Whether no further transition is possible
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Failed(_))
    }

    fn advance(&mut self, next: Self) {
        debug!(from = ?*self, to = ?next, "delivery stage");
        *self = next;
    }
}

/// The delivery endpoint's request handler
///
/// Holds no per-request mutable state; cloning is cheap.
#[derive(Clone)]
pub struct DeliveryService {
    credentials: Arc<CredentialStore>,
    transport: Arc<dyn RelayTransport>,
}

impl DeliveryService {
    /// Create a service over a credential store and a relay transport
    #[must_use]
    pub fn new(credentials: Arc<CredentialStore>, transport: Arc<dyn RelayTransport>) -> Self {
        Self {
            credentials,
            transport,
        }
    }

    /// Configured credentials
    #[must_use]
    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Active relay mode
    #[must_use]
    pub fn relay_mode(&self) -> RelayMode {
        self.transport.mode()
    }

    /// Run one request through every stage
    ///
    /// # Errors
    ///
    /// Returns the [`DeliveryError`] of the first stage that fails.
    pub async fn deliver(&self, request: SendRequest) -> Result<DeliveryReceipt, DeliveryError> {
        let (stage, result) = self.deliver_staged(request).await;
        match &result {
            Ok(receipt) => info!(id = %receipt.id, from = %receipt.identity, "message sent"),
            Err(err) => {
                let detail = err.detail().unwrap_or_default();
                warn!(kind = %err.kind(), stage = ?stage, detail = %detail, "delivery failed: {err}");
            }
        }
        result
    }

    /// Like [`deliver`](Self::deliver), also reporting the final stage
    pub async fn deliver_staged(
        &self,
        request: SendRequest,
    ) -> (DeliveryStage, Result<DeliveryReceipt, DeliveryError>) {
        let mut stage = DeliveryStage::Received;
        let result = self.run(request, &mut stage).await;
        if let Err(err) = &result {
            stage.advance(DeliveryStage::Failed(err.kind()));
        }
        (stage, result)
    }

    async fn run(
        &self,
        request: SendRequest,
        stage: &mut DeliveryStage,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let request = request.validated()?;
        stage.advance(DeliveryStage::Validated);

        let credential = self.credentials.resolve(&request.from)?;
        stage.advance(DeliveryStage::CredentialResolved);

        self.transport
            .verify(&credential)
            .await
            .map_err(|e| DeliveryError::AuthenticationFailed {
                detail: e.to_string(),
            })?;
        stage.advance(DeliveryStage::TransportVerified);

        let message = OutboundMessage::for_request(&request, &credential);
        let id = self
            .transport
            .send(&credential, &message)
            .await
            .map_err(|e| DeliveryError::DeliveryFailed {
                detail: e.to_string(),
            })?;
        stage.advance(DeliveryStage::Sent);

        Ok(DeliveryReceipt {
            id,
            identity: credential.identity,
            simulated: self.transport.mode() == RelayMode::Simulated,
        })
    }
}
