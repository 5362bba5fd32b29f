//! Scripted delivery clients

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::controller::{CancellationToken, DeliveryClient, SendJob};
use crate::error::DeliveryError;

#[derive(Debug, Default)]
struct Script {
    failures: HashMap<String, DeliveryError>,
    calls: Vec<SendJob>,
}

/// Client that succeeds unless a recipient was scripted to fail
///
/// Clones share the same script and call log.
#[derive(Debug, Clone, Default)]
pub struct ScriptedClient {
    script: Arc<Mutex<Script>>,
}

impl ScriptedClient {
    /// Client that delivers everything
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every delivery to `address` with `err`
    #[must_use]
    pub fn fail(self, address: &str, err: DeliveryError) -> Self {
        self.script.lock().failures.insert(address.to_string(), err);
        self
    }

    /// Jobs received, in call order
    #[must_use]
    pub fn calls(&self) -> Vec<SendJob> {
        self.script.lock().calls.clone()
    }

    /// Recipients dispatched, in call order
    #[must_use]
    pub fn dispatched(&self) -> Vec<String> {
        self.script.lock().calls.iter().map(|job| job.to.clone()).collect()
    }
}

#[async_trait]
impl DeliveryClient for ScriptedClient {
    async fn deliver(
        &self,
        job: &SendJob,
        cancel: &CancellationToken,
    ) -> Result<String, DeliveryError> {
        if cancel.is_cancelled() {
            return Err(DeliveryError::Cancelled);
        }
        let mut script = self.script.lock();
        script.calls.push(job.clone());
        match script.failures.get(&job.to) {
            Some(err) => Err(err.clone()),
            None => Ok(format!("<{}@scripted.test>", script.calls.len())),
        }
    }
}

/// Client whose calls never complete on their own
///
/// The first `answered` calls succeed immediately; every later call waits
/// until the run is cancelled and then reports [`DeliveryError::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct HangingClient {
    answered: usize,
    calls: Arc<Mutex<Vec<SendJob>>>,
}

impl HangingClient {
    /// Client that hangs on every call
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Client that answers the first `answered` calls and hangs afterwards
    #[must_use]
    pub fn after(answered: usize) -> Self {
        Self {
            answered,
            ..Self::default()
        }
    }

    /// Recipients dispatched, in call order
    #[must_use]
    pub fn dispatched(&self) -> Vec<String> {
        self.calls.lock().iter().map(|job| job.to.clone()).collect()
    }
}

#[async_trait]
impl DeliveryClient for HangingClient {
    async fn deliver(
        &self,
        job: &SendJob,
        cancel: &CancellationToken,
    ) -> Result<String, DeliveryError> {
        let call = {
            let mut calls = self.calls.lock();
            calls.push(job.clone());
            calls.len()
        };
        if call <= self.answered {
            return Ok(format!("<{call}@hanging.test>"));
        }
        cancel.cancelled().await;
        Err(DeliveryError::Cancelled)
    }
}
