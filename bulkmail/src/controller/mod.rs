//! Send controller
//!
//! Drives one sequential run over the roster: each selected recipient that
//! has not been delivered yet is dispatched through a [`DeliveryClient`],
//! awaited, and recorded before the next one starts. A run can be cancelled
//! cooperatively; the signal is checked before every recipient and also
//! aborts the in-flight call.
//!
//! While a run is in progress the roster belongs to the controller and every
//! operator edit is rejected with [`ControllerError::RunInProgress`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bulkmail::controller::{CampaignMessage, HttpDeliveryClient, SendController};
//! use bulkmail::roster::Roster;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let roster = Roster::from_addresses(["a@example.com", "b@example.com"])?;
//! let controller = SendController::with_roster(
//!     Arc::new(HttpDeliveryClient::new("http://127.0.0.1:3000")),
//!     roster,
//! );
//!
//! let summary = controller
//!     .start_run("owner@domain.com", &CampaignMessage::default())
//!     .await?;
//! println!("{} sent, {} failed", summary.sent, summary.failed);
//! # Ok(())
//! # }
//! ```

mod cancellation;
mod client;
mod events;

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

pub use cancellation::CancellationToken;
#[cfg(test)]
pub use client::MockDeliveryClient;
pub use client::{DeliveryClient, HttpDeliveryClient, SendJob};
pub use events::{RunEvent, RunProgress, RunSummary};

use crate::config::CampaignSettings;
use crate::error::{DeliveryError, DeliveryErrorKind};
use crate::roster::{RecipientStatus, Roster, RosterError, RosterSnapshot};

/// Buffered events per subscriber before old ones are dropped
const EVENT_CAPACITY: usize = 256;

/// Placeholder replaced with the sender address in campaign text
pub const SENDER_PLACEHOLDER: &str = "{sender}";

/// Controller errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    /// The operation needs an idle controller
    #[error("a send run is already in progress")]
    RunInProgress,

    /// The roster refused the edit
    #[error(transparent)]
    Roster(#[from] RosterError),
}

/// Message sent to every recipient of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignMessage {
    /// Subject line
    pub subject: String,
    /// Plain text body
    pub text: String,
    /// Optional HTML body
    pub html: Option<String>,
}

impl Default for CampaignMessage {
    fn default() -> Self {
        Self::from_settings(&CampaignSettings::default())
    }
}

impl CampaignMessage {
    /// Plain-text message
    pub fn new(subject: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            text: text.into(),
            html: None,
        }
    }

    /// Message from configured campaign defaults
    #[must_use]
    pub fn from_settings(settings: &CampaignSettings) -> Self {
        Self::new(settings.subject.clone(), settings.text.clone())
    }

    /// Add an HTML alternative
    #[must_use]
    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    /// Job for one recipient, with `{sender}` filled in
    #[must_use]
    pub fn job(&self, to: &str, sender: &str) -> SendJob {
        let fill = |s: &str| s.replace(SENDER_PLACEHOLDER, sender);
        SendJob {
            to: to.to_string(),
            from: sender.to_string(),
            subject: fill(&self.subject),
            text: fill(&self.text),
            html: self.html.as_deref().map(fill),
        }
    }
}

#[derive(Debug, Default)]
struct RunState {
    in_progress: bool,
    cancel_requested: bool,
    progress: RunProgress,
    token: Option<CancellationToken>,
}

struct Inner {
    roster: RwLock<Roster>,
    run: Mutex<RunState>,
    client: Arc<dyn DeliveryClient>,
    events: broadcast::Sender<RunEvent>,
}

/// Returns the controller to idle when a run ends, however it ends
///
/// A run future dropped mid-dispatch leaves its in-flight entry at
/// `Sending`; that entry is settled as cancelled.
struct RunGuard<'a> {
    inner: &'a Inner,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let mut run = self.inner.run.lock();
        let mut roster = self.inner.roster.write();

        let stranded: Vec<String> = roster
            .entries()
            .iter()
            .filter(|entry| matches!(entry.status, RecipientStatus::Sending))
            .map(|entry| entry.address.clone())
            .collect();
        for address in stranded {
            warn!(to = %address, "run dropped mid-dispatch");
            let cancelled = RecipientStatus::Failed {
                kind: DeliveryErrorKind::Cancelled,
                detail: DeliveryError::Cancelled.to_string(),
            };
            if let Err(err) = roster.update_status(&address, cancelled) {
                warn!(to = %address, %err, "could not settle in-flight recipient");
                continue;
            }
            let _ = self.inner.events.send(RunEvent::Cancelled { address });
        }

        *run = RunState::default();
    }
}

/// Sequential send-and-track controller
///
/// Cloning shares the same roster and run state, so one clone can cancel a
/// run another clone is driving.
#[derive(Clone)]
pub struct SendController {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SendController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let running = self.is_running();
        let recipients = self.inner.roster.read().len();
        f.debug_struct("SendController")
            .field("recipients", &recipients)
            .field("running", &running)
            .finish_non_exhaustive()
    }
}

impl SendController {
    /// Controller with an empty roster
    #[must_use]
    pub fn new(client: Arc<dyn DeliveryClient>) -> Self {
        Self::with_roster(client, Roster::new())
    }

    /// Controller over an existing roster
    #[must_use]
    pub fn with_roster(client: Arc<dyn DeliveryClient>, roster: Roster) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                roster: RwLock::new(roster),
                run: Mutex::new(RunState::default()),
                client,
                events,
            }),
        }
    }

    /// Receive run events from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.inner.events.subscribe()
    }

    /// Whether a run is in progress
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.run.lock().in_progress
    }

    /// Copy of the roster
    #[must_use]
    pub fn snapshot(&self) -> RosterSnapshot {
        self.inner.roster.read().snapshot()
    }

    /// Completed versus selected recipients
    ///
    /// While idle this reflects the roster: selected recipients already
    /// delivered count as completed.
    #[must_use]
    pub fn progress(&self) -> RunProgress {
        let run = self.inner.run.lock();
        if run.in_progress {
            return run.progress;
        }
        drop(run);

        let roster = self.inner.roster.read();
        RunProgress {
            completed: roster.selected_sent_count(),
            total: roster.selected_count(),
        }
    }

    /// Dispatch every eligible recipient in roster order
    ///
    /// Individual failures are recorded and do not stop the run. Returns
    /// once every eligible recipient was handled or a cancellation was
    /// observed.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::RunInProgress`] if a run is already going.
    pub async fn start_run(
        &self,
        sender: &str,
        message: &CampaignMessage,
    ) -> Result<RunSummary, ControllerError> {
        let (token, eligible, progress) = {
            let mut run = self.inner.run.lock();
            if run.in_progress {
                return Err(ControllerError::RunInProgress);
            }
            let roster = self.inner.roster.read();
            let progress = RunProgress {
                completed: roster.selected_sent_count(),
                total: roster.selected_count(),
            };
            let token = CancellationToken::new();
            *run = RunState {
                in_progress: true,
                cancel_requested: false,
                progress,
                token: Some(token.clone()),
            };
            (token, roster.eligible(), progress)
        };
        let guard = RunGuard { inner: &self.inner };

        info!(%sender, selected = progress.total, eligible = eligible.len(), "send run started");
        self.emit(RunEvent::Started {
            sender: sender.to_string(),
            total: progress.total,
        });
        self.emit(progress.into());

        let result = if progress.total == 0 {
            Ok(RunSummary::default())
        } else {
            self.dispatch_all(sender, message, &eligible, &token).await
        };

        drop(guard);

        let summary = result?;
        info!(
            sent = summary.sent,
            failed = summary.failed,
            cancelled = summary.cancelled,
            stopped_early = summary.stopped_early,
            "send run finished"
        );
        self.emit(RunEvent::Finished(summary));
        Ok(summary)
    }

    /// Stop the current run
    ///
    /// Aborts the in-flight call and prevents further dispatch. Recipients
    /// already delivered stay delivered. No-op when idle.
    pub fn request_cancel(&self) {
        let mut run = self.inner.run.lock();
        if !run.in_progress {
            return;
        }
        run.cancel_requested = true;
        if let Some(token) = &run.token {
            token.cancel();
        }
        info!("send run cancellation requested");
    }

    /// Append a recipient
    ///
    /// # Errors
    ///
    /// Rejected while running, for invalid addresses, and for duplicates
    pub fn add_recipient(&self, address: &str) -> Result<(), ControllerError> {
        self.edit(|roster| roster.add(address))
    }

    /// Remove a recipient
    ///
    /// # Errors
    ///
    /// Rejected while running or when the address is unknown
    pub fn remove_recipient(&self, address: &str) -> Result<(), ControllerError> {
        self.edit(|roster| roster.remove(address).map(|_| ()))
    }

    /// Flip one recipient's selection and return the new value
    ///
    /// # Errors
    ///
    /// Rejected while running or when the address is unknown
    pub fn toggle_selection(&self, address: &str) -> Result<bool, ControllerError> {
        self.edit(|roster| roster.toggle_selection(address))
    }

    /// Select every recipient
    ///
    /// # Errors
    ///
    /// Rejected while running
    pub fn select_all(&self) -> Result<(), ControllerError> {
        self.edit(|roster| {
            roster.set_all_selected(true);
            Ok(())
        })
    }

    /// Deselect every recipient
    ///
    /// # Errors
    ///
    /// Rejected while running
    pub fn deselect_all(&self) -> Result<(), ControllerError> {
        self.edit(|roster| {
            roster.set_all_selected(false);
            Ok(())
        })
    }

    /// Select all, or deselect all if everything is already selected
    ///
    /// # Errors
    ///
    /// Rejected while running
    pub fn toggle_all(&self) -> Result<bool, ControllerError> {
        self.edit(|roster| Ok(roster.toggle_all()))
    }

    /// Replace the roster with a fresh one built from `addresses`
    ///
    /// # Errors
    ///
    /// Rejected while running, or if any address is invalid or repeated
    pub fn reset<I, S>(&self, addresses: I) -> Result<(), ControllerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fresh = Roster::from_addresses(addresses)?;
        self.edit(move |roster| {
            *roster = fresh;
            Ok(())
        })
    }

    fn edit<T>(
        &self,
        f: impl FnOnce(&mut Roster) -> Result<T, RosterError>,
    ) -> Result<T, ControllerError> {
        let run = self.inner.run.lock();
        if run.in_progress {
            warn!("roster edit rejected: run in progress");
            return Err(ControllerError::RunInProgress);
        }
        let mut roster = self.inner.roster.write();
        let result = f(&mut roster);
        drop(roster);
        drop(run);
        Ok(result?)
    }

    async fn dispatch_all(
        &self,
        sender: &str,
        message: &CampaignMessage,
        eligible: &[String],
        token: &CancellationToken,
    ) -> Result<RunSummary, ControllerError> {
        let mut summary = RunSummary::default();

        for address in eligible {
            if self.inner.run.lock().cancel_requested {
                debug!(next = %address, "stopping run before next recipient");
                summary.stopped_early = true;
                break;
            }

            self.set_status(address, RecipientStatus::Sending)?;
            self.emit(RunEvent::Dispatching {
                address: address.clone(),
            });

            let job = message.job(address, sender);
            let outcome = self.inner.client.deliver(&job, token).await;
            summary.dispatched += 1;

            match outcome {
                Ok(id) => {
                    info!(to = %address, %id, "recipient sent");
                    let message_id = (!id.is_empty()).then(|| id.clone());
                    self.set_status(address, RecipientStatus::Sent { message_id })?;
                    summary.sent += 1;
                    self.emit(RunEvent::Sent {
                        address: address.clone(),
                        id,
                    });
                }
                Err(DeliveryError::Cancelled) => {
                    info!(to = %address, "recipient cancelled in flight");
                    self.set_status(
                        address,
                        RecipientStatus::Failed {
                            kind: DeliveryErrorKind::Cancelled,
                            detail: DeliveryError::Cancelled.to_string(),
                        },
                    )?;
                    summary.cancelled += 1;
                    self.emit(RunEvent::Cancelled {
                        address: address.clone(),
                    });
                }
                Err(err) => {
                    let kind = err.kind();
                    let detail = err.detail().unwrap_or_else(|| err.to_string());
                    warn!(to = %address, %kind, %detail, "recipient failed");
                    self.set_status(
                        address,
                        RecipientStatus::Failed {
                            kind,
                            detail: detail.clone(),
                        },
                    )?;
                    summary.failed += 1;
                    self.emit(RunEvent::Failed {
                        address: address.clone(),
                        kind,
                        detail,
                    });
                }
            }

            let progress = {
                let mut run = self.inner.run.lock();
                run.progress.completed += 1;
                run.progress
            };
            self.emit(progress.into());
        }

        Ok(summary)
    }

    fn set_status(&self, address: &str, status: RecipientStatus) -> Result<(), RosterError> {
        self.inner.roster.write().update_status(address, status)
    }

    fn emit(&self, event: RunEvent) {
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    fn recording_mock(fail: &'static str) -> (MockDeliveryClient, Arc<StdMutex<Vec<String>>>) {
        let calls = Arc::new(StdMutex::new(Vec::new()));
        let seen = calls.clone();
        let mut client = MockDeliveryClient::new();
        client.expect_deliver().returning(move |job, _| {
            seen.lock().unwrap().push(job.to.clone());
            if job.to == fail {
                Err(DeliveryError::DeliveryFailed {
                    detail: "550 mailbox unavailable".into(),
                })
            } else {
                Ok(format!("<{}>", job.to))
            }
        });
        (client, calls)
    }

    fn controller(client: MockDeliveryClient, addresses: &[&str]) -> SendController {
        SendController::with_roster(
            Arc::new(client),
            Roster::from_addresses(addresses.iter().copied()).unwrap(),
        )
    }

    #[test]
    fn test_campaign_job_fills_sender() {
        let job = CampaignMessage::default().job("a@b.com", "owner@domain.com");
        assert_eq!(job.subject, "Bulk Email Test");
        assert_eq!(job.text, "Hello, this is a test email from owner@domain.com.");
        assert_eq!(job.from, "owner@domain.com");
        assert!(job.html.is_none());

        let job = CampaignMessage::new("Hi", "plain")
            .with_html("<p>from {sender}</p>")
            .job("a@b.com", "x@y.com");
        assert_eq!(job.html.as_deref(), Some("<p>from x@y.com</p>"));
    }

    #[tokio::test]
    async fn test_run_dispatches_in_order_and_continues_after_failure() {
        let (client, calls) = recording_mock("b@x.com");
        let controller = controller(client, &["a@x.com", "b@x.com", "c@x.com"]);

        let summary = controller
            .start_run("owner@domain.com", &CampaignMessage::default())
            .await
            .unwrap();

        assert_eq!(*calls.lock().unwrap(), vec!["a@x.com", "b@x.com", "c@x.com"]);
        assert_eq!(summary.sent, 2);
        assert_eq!(summary.failed, 1);
        assert!(!summary.stopped_early);

        let snapshot = controller.snapshot();
        assert!(snapshot.get("a@x.com").unwrap().status.is_sent());
        assert_eq!(
            snapshot.get("b@x.com").unwrap().status,
            RecipientStatus::Failed {
                kind: DeliveryErrorKind::DeliveryFailed,
                detail: "550 mailbox unavailable".into(),
            }
        );
        assert!(!controller.is_running());
    }

    #[tokio::test]
    async fn test_run_skips_unselected_and_sent() {
        let (client, calls) = recording_mock("none");
        let controller = controller(client, &["a@x.com", "b@x.com", "c@x.com"]);
        controller.toggle_selection("b@x.com").unwrap();

        controller
            .start_run("owner@domain.com", &CampaignMessage::default())
            .await
            .unwrap();
        assert_eq!(*calls.lock().unwrap(), vec!["a@x.com", "c@x.com"]);
        assert_eq!(
            controller.snapshot().get("b@x.com").unwrap().status,
            RecipientStatus::Pending
        );

        // Everything selected is delivered; a second run dispatches nothing
        calls.lock().unwrap().clear();
        let summary = controller
            .start_run("owner@domain.com", &CampaignMessage::default())
            .await
            .unwrap();
        assert_eq!(summary.dispatched, 0);
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(controller.progress().percent(), 100);
    }

    #[tokio::test]
    async fn test_nothing_selected_short_circuits() {
        let mut client = MockDeliveryClient::new();
        client.expect_deliver().times(0);
        let controller = controller(client, &["a@x.com"]);
        controller.deselect_all().unwrap();

        let summary = controller
            .start_run("owner@domain.com", &CampaignMessage::default())
            .await
            .unwrap();

        assert_eq!(summary, RunSummary::default());
        assert_eq!(controller.progress(), RunProgress::default());
        assert_eq!(controller.progress().percent(), 0);
    }

    #[tokio::test]
    async fn test_failed_entries_are_retried_next_run() {
        let mut client = MockDeliveryClient::new();
        let mut seq = mockall::Sequence::new();
        client
            .expect_deliver()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(DeliveryError::endpoint("connection refused")));
        client
            .expect_deliver()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok("<retry@x.com>".into()));
        let controller = controller(client, &["a@x.com"]);

        let first = controller
            .start_run("owner@domain.com", &CampaignMessage::default())
            .await
            .unwrap();
        assert_eq!(first.failed, 1);
        assert_eq!(
            controller.snapshot().get("a@x.com").unwrap().status.name(),
            "failed"
        );

        let second = controller
            .start_run("owner@domain.com", &CampaignMessage::default())
            .await
            .unwrap();
        assert_eq!(second.sent, 1);
        assert_eq!(
            controller.snapshot().get("a@x.com").unwrap().status,
            RecipientStatus::Sent {
                message_id: Some("<retry@x.com>".into())
            }
        );
    }

    #[tokio::test]
    async fn test_events_follow_run() {
        let (client, _) = recording_mock("b@x.com");
        let controller = controller(client, &["a@x.com", "b@x.com"]);
        let mut events = controller.subscribe();

        controller
            .start_run("owner@domain.com", &CampaignMessage::default())
            .await
            .unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }

        assert!(matches!(seen.first(), Some(RunEvent::Started { total: 2, .. })));
        assert!(seen.contains(&RunEvent::Sent {
            address: "a@x.com".into(),
            id: "<a@x.com>".into()
        }));
        assert!(seen.iter().any(|e| matches!(
            e,
            RunEvent::Failed { address, kind: DeliveryErrorKind::DeliveryFailed, .. } if address == "b@x.com"
        )));
        assert!(seen.contains(&RunEvent::Progress {
            completed: 2,
            total: 2,
            percent: 100
        }));
        assert!(matches!(seen.last(), Some(RunEvent::Finished(s)) if s.sent == 1 && s.failed == 1));
    }

    #[test]
    fn test_edits_when_idle() {
        let controller = controller(MockDeliveryClient::new(), &["a@x.com"]);

        assert_eq!(
            controller.add_recipient("not-an-email"),
            Err(ControllerError::Roster(RosterError::InvalidAddress(
                "not-an-email".into()
            )))
        );
        controller.add_recipient("user@example.com").unwrap();
        assert!(matches!(
            controller.add_recipient("user@example.com"),
            Err(ControllerError::Roster(RosterError::DuplicateAddress(_)))
        ));

        controller.remove_recipient("a@x.com").unwrap();
        assert!(!controller.toggle_all().unwrap());
        assert_eq!(controller.snapshot().selected_count(), 0);
        controller.select_all().unwrap();
        assert_eq!(controller.snapshot().selected_count(), 1);

        controller.reset(["n@x.com", "m@x.com"]).unwrap();
        assert_eq!(controller.snapshot().entries.len(), 2);
    }

    #[test]
    fn test_debug_does_not_block_concurrent_edits() {
        let controller = controller(MockDeliveryClient::new(), &["a@x.com"]);
        let editor = controller.clone();
        let (done_tx, done_rx) = std::sync::mpsc::channel();

        let edits = std::thread::spawn(move || {
            for _ in 0..20_000 {
                editor.add_recipient("b@x.com").unwrap();
                editor.remove_recipient("b@x.com").unwrap();
            }
        });
        let formatter = {
            let controller = controller.clone();
            std::thread::spawn(move || {
                for _ in 0..20_000 {
                    let _ = format!("{controller:?}");
                }
                done_tx.send(()).unwrap();
            })
        };

        done_rx
            .recv_timeout(std::time::Duration::from_secs(10))
            .expect("formatting finished without deadlock");
        formatter.join().unwrap();
        edits.join().unwrap();
        assert!(format!("{controller:?}").contains("running: false"));
    }

    #[test]
    fn test_cancel_when_idle_is_noop() {
        let controller = controller(MockDeliveryClient::new(), &["a@x.com"]);
        controller.request_cancel();
        assert!(!controller.is_running());
        assert_eq!(
            controller.snapshot().get("a@x.com").unwrap().status,
            RecipientStatus::Pending
        );
    }
}
