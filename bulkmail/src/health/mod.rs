//! Health check endpoint
//!
//! `GET /health` reports liveness plus the state of the two things a send
//! depends on: the relay and the credential table.
//!
//! ```rust,no_run
//! use axum::{routing::get, Router};
//! use bulkmail::{health::health_check, state::AppState};
//!
//! # fn example(state: AppState) {
//! let app: Router = Router::new()
//!     .route("/health", get(health_check))
//!     .with_state(state);
//! # }
//! ```

use std::collections::HashMap;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::delivery::RelayMode;
use crate::state::AppState;

/// Health check status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Fully operational
    Healthy,
    /// Running, but sends will not reach real recipients
    Degraded,
    /// Not able to serve
    Unhealthy,
}

/// Health of one component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component status
    pub status: HealthStatus,
    /// Optional detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentHealth {
    /// Healthy component with a message
    #[must_use]
    pub fn healthy(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Healthy,
            message: Some(message.into()),
        }
    }

    /// Degraded component
    #[must_use]
    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Degraded,
            message: Some(message.into()),
        }
    }
}

/// Body of `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    /// Worst status among components
    pub status: HealthStatus,
    /// Crate version
    pub version: String,
    /// Active relay mode
    pub relay: RelayMode,
    /// When the check ran
    pub timestamp: DateTime<Utc>,
    /// Per-component health
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthCheckResponse {
    /// Healthy response with no components
    #[must_use]
    pub fn new(relay: RelayMode) -> Self {
        Self {
            status: HealthStatus::Healthy,
            version: env!("CARGO_PKG_VERSION").to_string(),
            relay,
            timestamp: Utc::now(),
            components: HashMap::new(),
        }
    }

    /// Add a component and recompute the overall status
    pub fn add_component(&mut self, name: impl Into<String>, health: ComponentHealth) {
        self.components.insert(name.into(), health);
        self.status = self
            .components
            .values()
            .map(|c| c.status)
            .max_by_key(|status| match status {
                HealthStatus::Healthy => 0,
                HealthStatus::Degraded => 1,
                HealthStatus::Unhealthy => 2,
            })
            .unwrap_or(HealthStatus::Healthy);
    }

    /// HTTP status for this response
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self.status {
            HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for HealthCheckResponse {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}

/// Report service health
#[allow(clippy::unused_async)]
pub async fn health_check(State(state): State<AppState>) -> HealthCheckResponse {
    let delivery = state.delivery();
    let mode = delivery.relay_mode();
    let mut response = HealthCheckResponse::new(mode);

    let relay = match mode {
        RelayMode::Smtp => ComponentHealth::healthy(format!(
            "smtp relay {}",
            state.config().relay.host.as_deref().unwrap_or_default()
        )),
        RelayMode::Simulated => {
            ComponentHealth::degraded("simulated relay; messages are not delivered")
        }
    };
    response.add_component("relay", relay);

    let credentials = delivery.credentials();
    let count = credentials.senders().count();
    let senders = if count == 0 && !credentials.has_fallback() {
        ComponentHealth::degraded("no senders configured; every send is unauthorized")
    } else {
        ComponentHealth::healthy(format!(
            "{count} sender(s), fallback {}",
            if credentials.has_fallback() { "on" } else { "off" }
        ))
    };
    response.add_component("senders", senders);

    response
}
