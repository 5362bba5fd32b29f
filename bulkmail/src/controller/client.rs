//! Client side of `POST /send`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::CancellationToken;
use crate::delivery::{SendRequest, SendResponse};
use crate::error::DeliveryError;

/// One recipient's send, as issued by the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendJob {
    /// Recipient address
    pub to: String,
    /// Sender address
    pub from: String,
    /// Subject line
    pub subject: String,
    /// Plain text body
    pub text: String,
    /// Optional HTML body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

impl From<&SendJob> for SendRequest {
    fn from(job: &SendJob) -> Self {
        Self {
            to: Some(job.to.clone()),
            from: Some(job.from.clone()),
            subject: Some(job.subject.clone()),
            text: Some(job.text.clone()),
            html: job.html.clone(),
        }
    }
}

/// Performs one delivery call on behalf of the controller
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    /// Deliver one job and return the relay message id
    ///
    /// Implementations must stop waiting and return
    /// [`DeliveryError::Cancelled`] once `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns the endpoint's failure, [`DeliveryError::Cancelled`], or
    /// [`DeliveryError::Endpoint`] when the endpoint cannot be reached.
    async fn deliver(
        &self,
        job: &SendJob,
        cancel: &CancellationToken,
    ) -> Result<String, DeliveryError>;
}

/// [`DeliveryClient`] that posts JSON to a delivery endpoint
#[derive(Debug, Clone)]
pub struct HttpDeliveryClient {
    http: reqwest::Client,
    url: String,
}

impl HttpDeliveryClient {
    /// Client for the endpoint at `base_url` (the `/send` path is appended)
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Like [`new`](Self::new) with a preconfigured HTTP client
    #[must_use]
    pub fn with_client(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            url: format!("{}/send", base_url.trim_end_matches('/')),
        }
    }

    /// Full URL of the send endpoint
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post(&self, job: &SendJob) -> Result<String, DeliveryError> {
        let response = self
            .http
            .post(&self.url)
            .json(&SendRequest::from(job))
            .send()
            .await
            .map_err(|e| DeliveryError::endpoint(e.to_string()))?;

        let status = response.status();
        let reply: SendResponse = response
            .json()
            .await
            .map_err(|e| DeliveryError::endpoint(format!("unreadable reply ({status}): {e}")))?;

        debug!(to = %job.to, %status, success = reply.success, "endpoint replied");

        if status.is_success() && reply.success {
            Ok(reply.id.unwrap_or_default())
        } else {
            Err(DeliveryError::from_reply(status, &reply))
        }
    }
}

#[async_trait]
impl DeliveryClient for HttpDeliveryClient {
    async fn deliver(
        &self,
        job: &SendJob,
        cancel: &CancellationToken,
    ) -> Result<String, DeliveryError> {
        cancel
            .run_until_cancelled(self.post(job))
            .await
            .unwrap_or(Err(DeliveryError::Cancelled))
    }
}
