//! Cancellation of an in-flight delivery call

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

/// Signal shared between the controller and an in-flight delivery call
///
/// Cloning shares the signal; cancelling any clone cancels them all.
///
/// ```rust
/// use bulkmail::controller::CancellationToken;
///
/// # #[tokio::main]
/// # async fn main() {
/// let token = CancellationToken::new();
/// let call = token.clone();
/// token.cancel();
///
/// let outcome = call.run_until_cancelled(std::future::pending::<()>()).await;
/// assert!(outcome.is_none());
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    state: Arc<CancellationState>,
}

#[derive(Debug)]
struct CancellationState {
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
}

impl CancellationToken {
    /// A token that has not been cancelled
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            state: Arc::new(CancellationState { tx, rx }),
        }
    }

    /// Whether cancellation has been requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.state.rx.borrow()
    }

    /// Request cancellation; idempotent
    pub fn cancel(&self) {
        if !self.state.tx.send_replace(true) {
            debug!("cancellation requested");
        }
    }

    /// Resolve once cancelled; immediately if already cancelled
    pub async fn cancelled(&self) {
        let mut rx = self.state.rx.clone();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    /// Drive `future` to completion unless cancelled first
    ///
    /// Returns `None` when cancellation won; the future is dropped.
    pub async fn run_until_cancelled<F>(&self, future: F) -> Option<F::Output>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            () = self.cancelled() => None,
            output = future => Some(output),
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
