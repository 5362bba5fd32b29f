//! bulkmail: sequential bulk email dispatch
//!
//! Two halves that talk over one JSON endpoint:
//!
//! - **Send controller** ([`controller`]): walks a [`roster`] of recipients
//!   one at a time, calls the delivery endpoint for each selected recipient
//!   not yet delivered, tracks per-recipient status and progress, and can be
//!   cancelled mid-run.
//! - **Delivery endpoint** ([`delivery`], [`server`]): `POST /send` validates
//!   the request, maps the claimed sender to relay credentials, verifies the
//!   relay session and sends exactly one message.
//!
//! Recipient lists come from [`recipients`], which pulls addresses out of
//! free text or spreadsheet cells.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use bulkmail::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     bulkmail::observability::init()?;
//!
//!     let config = BulkmailConfig::load()?;
//!     bulkmail::server::serve(config).await
//! }
//! ```

pub mod config;
pub mod controller;
pub mod delivery;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod health;
pub mod observability;
pub mod recipients;
pub mod roster;
pub mod server;
pub mod state;
pub mod testing;

pub mod prelude {
    //! Convenience re-exports for common types
    //!
    //! ```rust
    //! use bulkmail::prelude::*;
    //! ```

    pub use crate::config::{BulkmailConfig, ConfigError};
    pub use crate::controller::{
        CampaignMessage, CancellationToken, ControllerError, DeliveryClient, HttpDeliveryClient,
        RunEvent, RunProgress, RunSummary, SendController, SendJob,
    };
    pub use crate::delivery::{
        CredentialStore, DeliveryService, RelayMode, RelayTransport, SendRequest, SendResponse,
    };
    pub use crate::error::{DeliveryError, DeliveryErrorKind};
    pub use crate::recipients::{extract_from_cells, extract_from_text, ExtractError};
    pub use crate::roster::{RecipientEntry, RecipientStatus, Roster, RosterError, RosterSnapshot};
    pub use crate::state::AppState;
}
