//! Integration tests for the send controller
//!
//! Covers cancellation mid-run, the run-in-progress guard, and full runs
//! against a real delivery endpoint over TCP.

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use axum::{routing::post, Router};
use bulkmail::controller::{
    CampaignMessage, ControllerError, HttpDeliveryClient, RunEvent, SendController,
};
use bulkmail::error::{DeliveryError, DeliveryErrorKind};
use bulkmail::roster::{RecipientStatus, Roster};
use bulkmail::server::router;
use bulkmail::state::AppState;
use bulkmail::testing::{
    config_with_sender, HangingClient, RecordingRelay, ScriptedClient, SpawnedServer,
};
use proptest::prelude::*;
use tokio::sync::broadcast;

const OWNER: &str = "owner@domain.com";

fn roster(addresses: &[&str]) -> Roster {
    Roster::from_addresses(addresses.iter().copied()).unwrap()
}

async fn wait_for_dispatch(events: &mut broadcast::Receiver<RunEvent>, address: &str) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(RunEvent::Dispatching { address: a }) if a == address => return,
                Ok(_) => {}
                Err(err) => panic!("event stream ended: {err}"),
            }
        }
    })
    .await
    .expect("dispatch event");
}

#[tokio::test]
async fn cancel_aborts_in_flight_and_leaves_rest_untouched() {
    let client = HangingClient::after(1);
    let controller = SendController::with_roster(
        Arc::new(client.clone()),
        roster(&["a@x.com", "b@x.com", "c@x.com"]),
    );
    let mut events = controller.subscribe();

    let run = {
        let controller = controller.clone();
        tokio::spawn(async move {
            controller
                .start_run(OWNER, &CampaignMessage::default())
                .await
        })
    };

    wait_for_dispatch(&mut events, "b@x.com").await;
    assert!(controller.is_running());
    assert_eq!(controller.progress().completed, 1);

    // The roster belongs to the run until it ends
    assert_eq!(
        controller.add_recipient("late@x.com"),
        Err(ControllerError::RunInProgress)
    );
    assert_eq!(
        controller.toggle_selection("c@x.com"),
        Err(ControllerError::RunInProgress)
    );
    assert_eq!(controller.select_all(), Err(ControllerError::RunInProgress));
    assert_eq!(
        controller
            .start_run(OWNER, &CampaignMessage::default())
            .await,
        Err(ControllerError::RunInProgress)
    );

    controller.request_cancel();
    let summary = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("run stops after cancel")
        .unwrap()
        .unwrap();

    assert_eq!(summary.sent, 1);
    assert_eq!(summary.cancelled, 1);
    assert_eq!(summary.failed, 0);
    assert!(summary.stopped_early);
    assert_eq!(client.dispatched(), vec!["a@x.com", "b@x.com"]);

    let snapshot = controller.snapshot();
    assert!(snapshot.get("a@x.com").unwrap().status.is_sent());
    assert_eq!(
        snapshot.get("b@x.com").unwrap().status,
        RecipientStatus::Failed {
            kind: DeliveryErrorKind::Cancelled,
            detail: DeliveryError::Cancelled.to_string(),
        }
    );
    assert_eq!(
        snapshot.get("c@x.com").unwrap().status,
        RecipientStatus::Pending
    );
    assert!(!controller.is_running());

    // Idle again: edits are accepted and a fresh run may start
    controller.add_recipient("late@x.com").unwrap();
}

#[tokio::test]
async fn cancelled_entry_stays_eligible() {
    let controller =
        SendController::with_roster(Arc::new(HangingClient::new()), roster(&["a@x.com"]));
    let mut events = controller.subscribe();

    let run = {
        let controller = controller.clone();
        tokio::spawn(async move {
            controller
                .start_run(OWNER, &CampaignMessage::default())
                .await
        })
    };
    wait_for_dispatch(&mut events, "a@x.com").await;
    controller.request_cancel();
    run.await.unwrap().unwrap();

    let snapshot = controller.snapshot();
    let entry = snapshot.get("a@x.com").unwrap();
    assert!(entry.status.is_failed());
    assert!(entry.is_eligible());

    let progress = controller.progress();
    assert_eq!((progress.completed, progress.total), (0, 1));

    // A cancel with no run in progress changes nothing
    controller.request_cancel();
    assert_eq!(controller.snapshot(), snapshot);
}

#[tokio::test]
async fn dropped_run_settles_in_flight_entry() {
    let controller = SendController::with_roster(
        Arc::new(HangingClient::new()),
        roster(&["a@x.com", "b@x.com"]),
    );
    let mut events = controller.subscribe();

    let outcome = tokio::time::timeout(
        Duration::from_millis(50),
        controller.start_run(OWNER, &CampaignMessage::default()),
    )
    .await;
    assert!(outcome.is_err());

    assert!(!controller.is_running());
    let snapshot = controller.snapshot();
    assert_eq!(
        snapshot.get("a@x.com").unwrap().status,
        RecipientStatus::Failed {
            kind: DeliveryErrorKind::Cancelled,
            detail: DeliveryError::Cancelled.to_string(),
        }
    );
    assert_eq!(
        snapshot.get("b@x.com").unwrap().status,
        RecipientStatus::Pending
    );

    let mut cancelled = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let RunEvent::Cancelled { address } = event {
            cancelled.push(address);
        }
    }
    assert_eq!(cancelled, vec!["a@x.com"]);

    // Idle again: edits and a fresh run are accepted
    controller.add_recipient("late@x.com").unwrap();
    controller.deselect_all().unwrap();
    let summary = controller
        .start_run(OWNER, &CampaignMessage::default())
        .await
        .unwrap();
    assert_eq!(summary.dispatched, 0);
}

#[tokio::test]
async fn end_to_end_over_http() {
    let relay = RecordingRelay::new();
    let state = AppState::new(config_with_sender(OWNER, "owner-secret"), Arc::new(relay.clone()));
    let server = SpawnedServer::start(router(state)).await.unwrap();

    let controller = SendController::with_roster(
        Arc::new(HttpDeliveryClient::new(&server.base_url())),
        roster(&["a@x.com", "b@x.com"]),
    );

    let summary = controller
        .start_run(OWNER, &CampaignMessage::default())
        .await
        .unwrap();

    assert_eq!(summary.sent, 2);
    assert!(summary.all_sent());

    let sent = relay.sent();
    assert_eq!(
        sent.iter().map(|m| m.to.as_str()).collect::<Vec<_>>(),
        vec!["a@x.com", "b@x.com"]
    );
    assert_eq!(sent[0].subject, "Bulk Email Test");
    assert_eq!(
        sent[0].text.as_deref(),
        Some("Hello, this is a test email from owner@domain.com.")
    );

    let snapshot = controller.snapshot();
    assert_eq!(
        snapshot.get("b@x.com").unwrap().status,
        RecipientStatus::Sent {
            message_id: Some("<2@recording.test>".into())
        }
    );
    assert_eq!(controller.progress().percent(), 100);
}

#[tokio::test]
async fn unauthorized_sender_fails_every_recipient_without_halting() {
    let relay = RecordingRelay::new();
    let state = AppState::new(config_with_sender(OWNER, "owner-secret"), Arc::new(relay.clone()));
    let server = SpawnedServer::start(router(state)).await.unwrap();

    let controller = SendController::with_roster(
        Arc::new(HttpDeliveryClient::new(&server.base_url())),
        roster(&["a@x.com", "b@x.com", "c@x.com"]),
    );

    let summary = controller
        .start_run("stranger@domain.com", &CampaignMessage::default())
        .await
        .unwrap();

    assert_eq!(summary.failed, 3);
    assert_eq!(summary.dispatched, 3);
    assert!(!summary.stopped_early);
    assert!(!relay.was_contacted());

    for entry in controller.snapshot().entries {
        match entry.status {
            RecipientStatus::Failed { kind, detail } => {
                assert_eq!(kind, DeliveryErrorKind::Unauthorized);
                assert!(detail.contains("stranger@domain.com"));
            }
            other => panic!("unexpected status {other}"),
        }
    }
}

#[tokio::test]
async fn cancel_aborts_hanging_http_call() {
    let hanging = Router::new().route("/send", post(|| pending::<&'static str>()));
    let server = SpawnedServer::start(hanging).await.unwrap();

    let controller = SendController::with_roster(
        Arc::new(HttpDeliveryClient::new(&server.base_url())),
        roster(&["a@x.com", "b@x.com"]),
    );
    let mut events = controller.subscribe();

    let run = {
        let controller = controller.clone();
        tokio::spawn(async move {
            controller
                .start_run(OWNER, &CampaignMessage::default())
                .await
        })
    };
    wait_for_dispatch(&mut events, "a@x.com").await;
    controller.request_cancel();

    let summary = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("in-flight call is aborted")
        .unwrap()
        .unwrap();

    assert_eq!(summary.cancelled, 1);
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.get("a@x.com").unwrap().status.name(), "failed");
    assert_eq!(
        snapshot.get("b@x.com").unwrap().status,
        RecipientStatus::Pending
    );
}

#[tokio::test]
async fn unreachable_endpoint_marks_failures() {
    let controller = SendController::with_roster(
        Arc::new(HttpDeliveryClient::new("http://127.0.0.1:1")),
        roster(&["a@x.com"]),
    );

    let summary = controller
        .start_run(OWNER, &CampaignMessage::default())
        .await
        .unwrap();

    assert_eq!(summary.failed, 1);
    assert!(matches!(
        controller.snapshot().get("a@x.com").unwrap().status,
        RecipientStatus::Failed {
            kind: DeliveryErrorKind::EndpointUnreachable,
            ..
        }
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn completed_run_settles_every_selected_entry(
        entries in proptest::collection::vec((any::<bool>(), any::<bool>()), 0..10)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let addresses: Vec<String> = (0..entries.len()).map(|i| format!("r{i}@x.com")).collect();
        let mut client = ScriptedClient::new();
        for (address, (_, fails)) in addresses.iter().zip(&entries) {
            if *fails {
                client = client.fail(address, DeliveryError::DeliveryFailed { detail: "550".into() });
            }
        }

        let controller = SendController::with_roster(
            Arc::new(client.clone()),
            Roster::from_addresses(addresses.clone()).unwrap(),
        );
        for (address, (selected, _)) in addresses.iter().zip(&entries) {
            if !selected {
                controller.toggle_selection(address).unwrap();
            }
        }

        let summary = runtime
            .block_on(controller.start_run(OWNER, &CampaignMessage::default()))
            .unwrap();

        let expected_order: Vec<String> = addresses
            .iter()
            .zip(&entries)
            .filter(|(_, (selected, _))| *selected)
            .map(|(address, _)| address.clone())
            .collect();
        prop_assert_eq!(client.dispatched(), expected_order.clone());
        prop_assert_eq!(summary.dispatched, expected_order.len());
        prop_assert_eq!(summary.sent + summary.failed, expected_order.len());

        let snapshot = controller.snapshot();
        for (address, (selected, fails)) in addresses.iter().zip(&entries) {
            let status = &snapshot.get(address).unwrap().status;
            if !selected {
                prop_assert_eq!(status, &RecipientStatus::Pending);
            } else if *fails {
                prop_assert!(status.is_failed());
            } else {
                prop_assert!(status.is_sent());
            }
        }
        prop_assert!(!controller.is_running());
    }
}
