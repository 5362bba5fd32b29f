//! `GET /senders`

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Authorized sender addresses, without secrets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendersResponse {
    /// Addresses in declaration order
    pub senders: Vec<String>,
    /// Whether unlisted senders may use the generic account
    pub fallback: bool,
}

/// List the configured senders
#[allow(clippy::unused_async)]
pub async fn senders(State(state): State<AppState>) -> Json<SendersResponse> {
    let credentials = state.delivery().credentials();
    Json(SendersResponse {
        senders: credentials.senders().map(ToString::to_string).collect(),
        fallback: credentials.has_fallback(),
    })
}
