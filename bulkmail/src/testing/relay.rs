//! Scripted relay

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::delivery::{OutboundMessage, RelayMode, RelayTransport, ResolvedCredential, TransportError};

#[derive(Debug, Default)]
struct RelayLog {
    verify_error: Option<TransportError>,
    send_error: Option<TransportError>,
    verified: Vec<String>,
    sent: Vec<OutboundMessage>,
}

/// Relay that records every call and fails only when told to
///
/// Clones share the same log.
///
/// ```rust
/// use bulkmail::delivery::TransportError;
/// use bulkmail::testing::RecordingRelay;
///
/// let relay = RecordingRelay::new()
///     .failing_verify(TransportError::Connection("535 bad credentials".into()));
/// assert!(!relay.was_contacted());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordingRelay {
    log: Arc<Mutex<RelayLog>>,
}

impl RecordingRelay {
    /// Relay that accepts everything
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every verification fail with `err`
    #[must_use]
    pub fn failing_verify(self, err: TransportError) -> Self {
        self.log.lock().verify_error = Some(err);
        self
    }

    /// Make every send fail with `err`
    #[must_use]
    pub fn failing_send(self, err: TransportError) -> Self {
        self.log.lock().send_error = Some(err);
        self
    }

    /// Accounts that verification was attempted with
    #[must_use]
    pub fn verified_accounts(&self) -> Vec<String> {
        self.log.lock().verified.clone()
    }

    /// Messages accepted for transmission
    #[must_use]
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.log.lock().sent.clone()
    }

    /// Whether any call reached the relay
    #[must_use]
    pub fn was_contacted(&self) -> bool {
        let log = self.log.lock();
        !log.verified.is_empty() || !log.sent.is_empty()
    }
}

#[async_trait]
impl RelayTransport for RecordingRelay {
    async fn verify(&self, credential: &ResolvedCredential) -> Result<(), TransportError> {
        let mut log = self.log.lock();
        log.verified.push(credential.account.clone());
        log.verify_error.clone().map_or(Ok(()), Err)
    }

    async fn send(
        &self,
        _credential: &ResolvedCredential,
        message: &OutboundMessage,
    ) -> Result<String, TransportError> {
        let mut log = self.log.lock();
        if let Some(err) = log.send_error.clone() {
            return Err(err);
        }
        log.sent.push(message.clone());
        Ok(format!("<{}@recording.test>", log.sent.len()))
    }

    fn mode(&self) -> RelayMode {
        RelayMode::Smtp
    }
}
