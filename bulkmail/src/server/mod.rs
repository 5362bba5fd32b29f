//! HTTP server for the delivery endpoint
//!
//! ```rust,no_run
//! use bulkmail::{config::BulkmailConfig, server};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = BulkmailConfig::load()?;
//! server::serve(config).await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use anyhow::Context;
use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::config::{BulkmailConfig, ServerSettings};
use crate::error::DeliveryError;
use crate::handlers;
use crate::health::health_check;
use crate::state::AppState;

/// Routes with the standard middleware stack
pub fn router(state: AppState) -> Router {
    let settings: &ServerSettings = &state.config().server;
    let timeout = Duration::from_millis(settings.request_timeout_ms);
    let body_limit = settings.body_limit_bytes;

    Router::new()
        .route("/send", post(handlers::send))
        .route("/senders", get(handlers::senders))
        .route("/health", get(health_check))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(middleware::from_fn_with_state(timeout, request_deadline))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Answer with a JSON `DeliveryFailed` body once `limit` elapses
async fn request_deadline(State(limit): State<Duration>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();
    match tokio::time::timeout(limit, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            let limit_ms = limit.as_millis();
            warn!(%path, limit_ms, "request timed out");
            DeliveryError::DeliveryFailed {
                detail: format!("request timed out after {limit_ms}ms"),
            }
            .into_response()
        }
    }
}

/// Bind the configured address and serve until Ctrl-C
///
/// # Errors
///
/// Fails if the relay configuration is unusable, the listen address is
/// invalid, or the port cannot be bound.
pub async fn serve(config: BulkmailConfig) -> anyhow::Result<()> {
    let addr = config.server.listen_addr()?;
    let state = AppState::from_config(config).context("invalid relay configuration")?;
    let mode = state.delivery().relay_mode();
    let senders = state.delivery().credentials().senders().count();

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(%addr, relay = %mode, senders, "delivery endpoint listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("delivery endpoint stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
