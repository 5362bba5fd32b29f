//! HTTP handlers
//!
//! - `POST /send` - deliver one message ([`send`])
//! - `GET /senders` - list authorized sender addresses ([`senders`])

pub mod send;
pub mod senders;

pub use send::send;
pub use senders::{senders, SendersResponse};
