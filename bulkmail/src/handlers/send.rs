//! `POST /send`

use axum::{extract::State, http::StatusCode, Json};

use crate::delivery::{SendRequest, SendResponse};
use crate::error::DeliveryError;
use crate::extractors::JsonBody;
use crate::state::AppState;

/// Deliver one message
///
/// Replies `200` with the relay message id, or the failure's status code
/// with a JSON body carrying `message`, `error` and `kind`.
pub async fn send(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<SendRequest>,
) -> Result<(StatusCode, Json<SendResponse>), DeliveryError> {
    let receipt = state.delivery().deliver(request).await?;
    Ok((StatusCode::OK, Json(SendResponse::sent(&receipt))))
}
