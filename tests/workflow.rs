mod common;

use std::{sync::Arc, time::Duration};

use scanmark_lib::{
    error::WorkflowError,
    gate::{CancelReason, GateOutcome},
    models::{AttemptStatus, CaptureContext, Identifier, OutcomeStatus},
    presenter::KioskEvent,
};
use tokio::time::{self, Instant};

use common::{
    mark, matched, status_only, wait_until_counting, workflow_with, FakeCamera, FakeServer,
    RecordingPresenter,
};

fn context(delay: u32) -> CaptureContext {
    CaptureContext::new("CSE", "OS", delay).unwrap()
}

fn gate_ticks(presenter: &RecordingPresenter) -> usize {
    presenter.count(|event| matches!(event, KioskEvent::GateTick { .. }))
}

#[tokio::test(start_paused = true)]
async fn unattended_match_confirms_after_exactly_delay_ticks() {
    let server = Arc::new(FakeServer::new(matched(42, "Asha"), mark("success", None)));
    let presenter = Arc::new(RecordingPresenter::default());
    let workflow = workflow_with(server.clone(), presenter.clone(), &FakeCamera::working()).await;

    let started = Instant::now();
    let report = workflow.start_attempt(context(5), false).await;
    let elapsed = started.elapsed();

    assert_eq!(report.status, AttemptStatus::Marked);
    assert!(elapsed >= Duration::from_secs(5) && elapsed < Duration::from_secs(6));
    assert_eq!(workflow.gate().get_state().await.ticks, 5);
    // Ticks 1-4 update the counter, the fifth commits.
    assert_eq!(gate_ticks(&presenter), 4);
    assert_eq!(server.marks(), 1);

    let requests = server.mark_requests.lock().unwrap().clone();
    assert_eq!(requests[0].user_id, Identifier::Number(42));
    assert_eq!(requests[0].field, "CSE");
    assert_eq!(requests[0].course, "OS");
}

#[tokio::test(start_paused = true)]
async fn success_navigates_to_dashboard_of_originating_context() {
    let server = Arc::new(FakeServer::new(matched(7, "Ravi"), mark("success", None)));
    let presenter = Arc::new(RecordingPresenter::default());
    let workflow = workflow_with(server.clone(), presenter.clone(), &FakeCamera::working()).await;

    let ctx = CaptureContext::new("B.Tech CSE", "Operating Systems", 2).unwrap();
    let report = workflow.start_attempt(ctx, false).await;

    assert_eq!(
        report.navigated_to.as_deref(),
        Some("/attendance-dashboard/B.Tech CSE/Operating Systems")
    );
    assert_eq!(
        presenter.navigations(),
        vec!["/attendance-dashboard/B.Tech CSE/Operating Systems".to_string()]
    );
    let scan = server.scan_requests.lock().unwrap()[0].clone();
    assert!(scan.image.starts_with("data:image/jpeg;base64,"));
    assert_eq!(scan.field, "B.Tech CSE");
}

#[tokio::test(start_paused = true)]
async fn no_match_never_reaches_gate_or_submitter() {
    for status in ["no_match", "no-match"] {
        let server = Arc::new(FakeServer::new(status_only(status), mark("success", None)));
        let presenter = Arc::new(RecordingPresenter::default());
        let workflow =
            workflow_with(server.clone(), presenter.clone(), &FakeCamera::working()).await;

        let report = workflow.start_attempt(context(5), false).await;

        assert_eq!(report.status, AttemptStatus::NoMatch);
        assert_eq!(server.marks(), 0);
        assert!(!workflow.gate().get_snapshot().await.ticker_active);
        assert_eq!(
            presenter.count(|e| matches!(e, KioskEvent::GateStarted { .. })),
            0
        );
        let notice = workflow.notices().current().await.unwrap();
        assert_eq!(notice.message, "Face not recognized.");
    }
}

#[tokio::test(start_paused = true)]
async fn no_face_is_reported_without_submitting() {
    let server = Arc::new(FakeServer::new(status_only("no-face"), mark("success", None)));
    let presenter = Arc::new(RecordingPresenter::default());
    let workflow = workflow_with(server.clone(), presenter, &FakeCamera::working()).await;

    let report = workflow.start_attempt(context(5), false).await;

    assert_eq!(report.status, AttemptStatus::NoMatch);
    assert_eq!(server.marks(), 0);
    let notice = workflow.notices().current().await.unwrap();
    assert_eq!(notice.message, "No face detected. Please face the camera.");
}

#[tokio::test(start_paused = true)]
async fn cancel_during_countdown_never_submits() {
    let server = Arc::new(FakeServer::new(matched(42, "Asha"), mark("success", None)));
    let presenter = Arc::new(RecordingPresenter::default());
    let workflow = workflow_with(server.clone(), presenter.clone(), &FakeCamera::working()).await;

    let task = {
        let workflow = workflow.clone();
        tokio::spawn(async move { workflow.start_attempt(context(5), false).await })
    };
    wait_until_counting(&workflow).await;
    time::sleep(Duration::from_millis(2_500)).await;

    assert!(workflow.cancel().await);
    let report = task.await.unwrap();
    assert_eq!(report.status, AttemptStatus::Cancelled);

    let ticks_at_cancel = gate_ticks(&presenter);
    time::sleep(Duration::from_secs(10)).await;

    assert_eq!(gate_ticks(&presenter), ticks_at_cancel);
    assert_eq!(server.marks(), 0);
    assert!(presenter.navigations().is_empty());
    assert_eq!(
        workflow.gate().get_state().await.outcome,
        Some(GateOutcome::Cancelled(CancelReason::User))
    );
    // Cancelled stays cancelled: nothing to confirm any more.
    assert!(!workflow.confirm().await);
}

#[tokio::test(start_paused = true)]
async fn confirm_now_submits_before_countdown_ends() {
    let server = Arc::new(FakeServer::new(matched(42, "Asha"), mark("success", None)));
    let presenter = Arc::new(RecordingPresenter::default());
    let workflow = workflow_with(server.clone(), presenter, &FakeCamera::working()).await;

    let started = Instant::now();
    let task = {
        let workflow = workflow.clone();
        tokio::spawn(async move { workflow.start_attempt(context(5), false).await })
    };
    wait_until_counting(&workflow).await;
    time::sleep(Duration::from_millis(1_200)).await;

    assert!(workflow.confirm().await);
    let report = task.await.unwrap();

    assert_eq!(report.status, AttemptStatus::Marked);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(server.marks(), 1);

    time::sleep(Duration::from_secs(10)).await;
    assert_eq!(server.marks(), 1);
}

#[tokio::test(start_paused = true)]
async fn second_capture_supersedes_pending_countdown() {
    let server = Arc::new(FakeServer::new(matched(42, "Asha"), mark("success", None)));
    let presenter = Arc::new(RecordingPresenter::default());
    let workflow = workflow_with(server.clone(), presenter.clone(), &FakeCamera::working()).await;

    let first = {
        let workflow = workflow.clone();
        tokio::spawn(async move { workflow.start_attempt(context(5), false).await })
    };
    wait_until_counting(&workflow).await;
    time::sleep(Duration::from_secs(2)).await;

    let second = {
        let workflow = workflow.clone();
        tokio::spawn(async move { workflow.start_attempt(context(5), false).await })
    };

    let first = first.await.unwrap();
    assert_eq!(first.status, AttemptStatus::Superseded);

    let second = second.await.unwrap();
    assert_eq!(second.status, AttemptStatus::Marked);
    assert_eq!(server.marks(), 1);
    assert_eq!(presenter.navigations().len(), 1);
    assert_eq!(
        presenter.count(|e| matches!(
            e,
            KioskEvent::GateResolved {
                outcome: GateOutcome::Cancelled(CancelReason::Superseded),
                ..
            }
        )),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn capture_started_during_scan_cancels_the_older_attempt() {
    let server = Arc::new(
        FakeServer::new(matched(42, "Asha"), mark("success", None))
            .with_scan_latency(Duration::from_secs(3)),
    );
    let presenter = Arc::new(RecordingPresenter::default());
    let workflow = workflow_with(server.clone(), presenter.clone(), &FakeCamera::working()).await;

    let first = {
        let workflow = workflow.clone();
        tokio::spawn(async move { workflow.start_attempt(context(5), false).await })
    };
    time::sleep(Duration::from_secs(1)).await;
    let second = {
        let workflow = workflow.clone();
        tokio::spawn(async move { workflow.start_attempt(context(5), false).await })
    };

    assert_eq!(first.await.unwrap().status, AttemptStatus::Superseded);
    assert_eq!(second.await.unwrap().status, AttemptStatus::Marked);
    assert_eq!(server.scans(), 2);
    assert_eq!(server.marks(), 1);
    assert_eq!(
        presenter.count(|e| matches!(e, KioskEvent::GateStarted { .. })),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn already_marked_shows_expiring_notice_without_navigation() {
    let server = Arc::new(FakeServer::new(
        matched(42, "Asha"),
        mark("already_marked", Some("Already marked")),
    ));
    let presenter = Arc::new(RecordingPresenter::default());
    let workflow = workflow_with(server.clone(), presenter.clone(), &FakeCamera::working()).await;

    let report = workflow.start_attempt(context(1), false).await;

    assert_eq!(report.status, AttemptStatus::AlreadyMarked);
    assert_eq!(
        report.outcome.as_ref().map(|o| o.status),
        Some(OutcomeStatus::AlreadyMarked)
    );
    assert!(presenter.navigations().is_empty());
    assert_eq!(
        workflow.notices().current().await.map(|n| n.message),
        Some("Already marked".to_string())
    );

    time::sleep(Duration::from_millis(4_900)).await;
    assert!(workflow.notices().current().await.is_some());
    time::sleep(Duration::from_millis(200)).await;
    assert!(workflow.notices().current().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn closed_window_keeps_kiosk_in_place() {
    let server = Arc::new(FakeServer::new(
        matched(42, "Asha"),
        mark("closed", Some("Attendance window is closed. You are marked absent.")),
    ));
    let presenter = Arc::new(RecordingPresenter::default());
    let workflow = workflow_with(server.clone(), presenter.clone(), &FakeCamera::working()).await;

    let report = workflow.start_attempt(context(1), false).await;
    assert_eq!(report.status, AttemptStatus::Closed);
    assert!(presenter.navigations().is_empty());

    // The operator can start over right away.
    let again = workflow.start_attempt(context(1), false).await;
    assert_eq!(again.status, AttemptStatus::Closed);
    assert_eq!(server.marks(), 2);
}

#[tokio::test(start_paused = true)]
async fn scan_network_failure_aborts_without_retry() {
    let server = Arc::new(
        FakeServer::new(matched(42, "Asha"), mark("success", None))
            .failing_scan(WorkflowError::Network("connection refused".into())),
    );
    let presenter = Arc::new(RecordingPresenter::default());
    let workflow = workflow_with(server.clone(), presenter.clone(), &FakeCamera::working()).await;

    let report = workflow.start_attempt(context(5), false).await;

    assert_eq!(report.status, AttemptStatus::Failed);
    assert_eq!(report.error.as_ref().map(|e| e.kind()), Some("network"));
    assert_eq!(server.scans(), 1);
    assert_eq!(server.marks(), 0);
    assert_eq!(
        presenter.count(|e| matches!(e, KioskEvent::Failure { kind, .. } if kind == "network")),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn submit_network_failure_is_loud_and_does_not_navigate() {
    let server = Arc::new(
        FakeServer::new(matched(42, "Asha"), mark("success", None))
            .failing_mark(WorkflowError::Network("HTTP 502".into())),
    );
    let presenter = Arc::new(RecordingPresenter::default());
    let workflow = workflow_with(server.clone(), presenter.clone(), &FakeCamera::working()).await;

    let report = workflow.start_attempt(context(1), false).await;

    assert_eq!(report.status, AttemptStatus::Failed);
    assert_eq!(server.marks(), 1);
    assert!(presenter.navigations().is_empty());
    assert_eq!(
        presenter.count(|e| matches!(e, KioskEvent::Failure { .. })),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn unavailable_camera_blocks_capture_until_retry() {
    let server = Arc::new(FakeServer::new(matched(42, "Asha"), mark("success", None)));
    let presenter = Arc::new(RecordingPresenter::default());
    let workflow = workflow_with(server.clone(), presenter.clone(), &FakeCamera::denied()).await;

    assert!(!workflow.has_camera().await);
    assert_eq!(
        presenter.count(
            |e| matches!(e, KioskEvent::Failure { kind, .. } if kind == "device-unavailable")
        ),
        1
    );

    let report = workflow.start_attempt(context(1), false).await;
    assert!(matches!(report.error, Some(WorkflowError::DeviceUnavailable(_))));
    assert_eq!(server.scans(), 0);

    workflow
        .acquire_camera(&FakeCamera::working())
        .await
        .unwrap();
    let report = workflow.start_attempt(context(1), false).await;
    assert_eq!(report.status, AttemptStatus::Marked);
}

#[tokio::test(start_paused = true)]
async fn unrendered_stream_is_not_submitted() {
    let server = Arc::new(FakeServer::new(matched(42, "Asha"), mark("success", None)));
    let presenter = Arc::new(RecordingPresenter::default());
    let workflow =
        workflow_with(server.clone(), presenter, &FakeCamera::not_rendering()).await;

    let report = workflow.start_attempt(context(1), false).await;

    assert!(matches!(report.error, Some(WorkflowError::CaptureFailed(_))));
    assert_eq!(server.scans(), 0);
}

#[tokio::test(start_paused = true)]
async fn pre_scan_countdown_precedes_capture() {
    let server = Arc::new(FakeServer::new(matched(42, "Asha"), mark("success", None)));
    let presenter = Arc::new(RecordingPresenter::default());
    let workflow = workflow_with(server.clone(), presenter.clone(), &FakeCamera::working()).await;

    let started = Instant::now();
    let report = workflow.start_attempt(context(3), true).await;

    assert_eq!(report.status, AttemptStatus::Marked);
    assert!(started.elapsed() >= Duration::from_secs(6));

    let countdown: Vec<u32> = presenter
        .events()
        .into_iter()
        .filter_map(|event| match event {
            KioskEvent::ScanCountdown { remaining_secs, .. } => Some(remaining_secs),
            _ => None,
        })
        .collect();
    assert_eq!(countdown, vec![3, 2, 1]);

    let events = presenter.events();
    let scanning = events
        .iter()
        .position(|e| matches!(e, KioskEvent::Scanning { .. }))
        .unwrap();
    let last_countdown = events
        .iter()
        .rposition(|e| matches!(e, KioskEvent::ScanCountdown { .. }))
        .unwrap();
    assert!(last_countdown < scanning);
}
