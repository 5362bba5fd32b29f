//! Test doubles for the delivery endpoint and the send controller
//!
//! - [`RecordingRelay`] - scripted [`RelayTransport`](crate::delivery::RelayTransport) that records calls
//! - [`ScriptedClient`] - scripted [`DeliveryClient`](crate::controller::DeliveryClient) that records dispatch order
//! - [`HangingClient`] - delivery client that never answers until cancelled
//! - [`SpawnedServer`] - router served on an ephemeral local port
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use bulkmail::controller::{CampaignMessage, SendController};
//! use bulkmail::roster::Roster;
//! use bulkmail::testing::ScriptedClient;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let client = ScriptedClient::new();
//! let roster = Roster::from_addresses(["a@x.com", "b@x.com"]).unwrap();
//! let controller = SendController::with_roster(Arc::new(client.clone()), roster);
//!
//! controller
//!     .start_run("owner@domain.com", &CampaignMessage::default())
//!     .await
//!     .unwrap();
//! assert_eq!(client.dispatched(), vec!["a@x.com", "b@x.com"]);
//! # }
//! ```

mod client;
mod relay;
mod server;

pub use client::{HangingClient, ScriptedClient};
pub use relay::RecordingRelay;
pub use server::SpawnedServer;

use crate::config::{BulkmailConfig, RelaySettings};
use crate::delivery::SenderBinding;

/// Configuration with one bound sender and the simulated relay
#[must_use]
pub fn config_with_sender(address: &str, secret: &str) -> BulkmailConfig {
    BulkmailConfig {
        relay: RelaySettings {
            simulate: true,
            simulated_delay_ms: 0,
            ..RelaySettings::default()
        },
        senders: vec![SenderBinding::new(address, secret)],
        ..BulkmailConfig::default()
    }
}
