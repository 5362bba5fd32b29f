//! Delivery endpoint
//!
//! Accepts exactly one send request, authenticates the claimed sender against
//! the configured credentials, and performs one transmission through the relay.
//!
//! The stages are strictly ordered and never retried:
//!
//! ```text
//! Received -> Validated -> CredentialResolved -> TransportVerified -> Sent
//! ```
//!
//! Any non-terminal stage may end in `Failed(kind)`.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use bulkmail::delivery::{
//!     CredentialStore, DeliveryService, SendRequest, SenderBinding, SimulatedRelay,
//! };
//!
//! # async fn example() -> Result<(), bulkmail::error::DeliveryError> {
//! let credentials = CredentialStore::new(
//!     vec![SenderBinding::new("owner@domain.com", "app-password")],
//!     None,
//! );
//! let service = DeliveryService::new(Arc::new(credentials), Arc::new(SimulatedRelay::default()));
//!
//! let receipt = service
//!     .deliver(SendRequest::new("a@b.com", "owner@domain.com", "Hello", "Hi there"))
//!     .await?;
//! println!("sent as {}", receipt.id);
//! # Ok(())
//! # }
//! ```

pub mod credentials;
mod message;
mod request;
mod service;
pub mod transport;

pub use credentials::{
    ClaimedSender, CredentialSource, CredentialStore, FallbackAccount, ResolvedCredential, Secret,
    SenderBinding,
};
pub use message::OutboundMessage;
pub use request::{DeliveryReceipt, SendRequest, SendResponse, ValidatedRequest};
pub use service::{DeliveryService, DeliveryStage};
pub use transport::{
    RelayMode, RelayTransport, SimulatedRelay, SmtpRelay, TransportError,
};
