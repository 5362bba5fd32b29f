//! Request extractors

use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::DeliveryError;

/// JSON body whose parse failures become [`DeliveryError::InvalidRequest`]
///
/// A malformed body, or one sent without a JSON content type, is answered
/// with the same 400 JSON shape as any other invalid request.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = DeliveryError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            debug!(status = %rejection.status(), "rejected request body");
            DeliveryError::invalid_body(rejection.body_text())
        })?;
        Ok(Self(value))
    }
}
