use std::{future::Future, sync::Arc, time::Duration};

use chrono::Utc;
use serde::Serialize;
use tokio::{sync::Mutex, time};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::camera::{CameraSource, StreamConstraints, VideoStream};
use crate::capture::{FrameCapturer, ImagePayload};
use crate::error::WorkflowError;
use crate::gate::{CancelReason, ConfirmationGate, GateOutcome};
use crate::journal::AttemptJournal;
use crate::matching::request_match;
use crate::models::{
    AttemptRecord, AttemptStatus, AttendanceOutcome, CaptureContext, MatchStatus,
    MatchedStudent, OutcomeStatus,
};
use crate::notice::{NoticeBoard, NoticeLevel, DEFAULT_NOTICE_TTL};
use crate::presenter::{KioskEvent, Presenter};
use crate::server::AttendanceServer;
use crate::submit::submit;
use crate::{log_error, log_info, log_warn};

const ENABLE_LOGS: bool = true;

#[derive(Debug, Clone, Copy)]
pub struct WorkflowOptions {
    pub capturer: FrameCapturer,
    pub constraints: StreamConstraints,
    pub notice_ttl: Duration,
    pub tick_interval: Duration,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            capturer: FrameCapturer::default(),
            constraints: StreamConstraints::default(),
            notice_ttl: DEFAULT_NOTICE_TTL,
            tick_interval: Duration::from_secs(1),
        }
    }
}

/// What one capture attempt ended in.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptReport {
    pub attempt_id: String,
    pub status: AttemptStatus,
    pub student: Option<MatchedStudent>,
    pub outcome: Option<AttendanceOutcome>,
    #[serde(skip)]
    pub error: Option<WorkflowError>,
    pub navigated_to: Option<String>,
}

impl AttemptReport {
    fn new(attempt_id: &str) -> Self {
        Self {
            attempt_id: attempt_id.to_string(),
            status: AttemptStatus::Scanning,
            student: None,
            outcome: None,
            error: None,
            navigated_to: None,
        }
    }
}

struct ActiveAttempt {
    id: String,
    token: CancellationToken,
}

/// Camera capture → face match → confirmation gate → attendance submission.
/// Cloning shares the same camera, gate and notice board.
#[derive(Clone)]
pub struct AttendanceWorkflow {
    stream: Arc<Mutex<Option<Box<dyn VideoStream>>>>,
    server: Arc<dyn AttendanceServer>,
    presenter: Arc<dyn Presenter>,
    journal: Option<AttemptJournal>,
    gate: ConfirmationGate,
    notices: NoticeBoard,
    active: Arc<Mutex<Option<ActiveAttempt>>>,
    /// Parent of every attempt token; cancelled once on shutdown.
    closing: CancellationToken,
    options: WorkflowOptions,
}

impl AttendanceWorkflow {
    pub fn new(
        server: Arc<dyn AttendanceServer>,
        presenter: Arc<dyn Presenter>,
        journal: Option<AttemptJournal>,
        options: WorkflowOptions,
    ) -> Self {
        Self {
            stream: Arc::new(Mutex::new(None)),
            gate: ConfirmationGate::with_tick_interval(presenter.clone(), options.tick_interval),
            notices: NoticeBoard::new(presenter.clone(), options.notice_ttl),
            server,
            presenter,
            journal,
            active: Arc::new(Mutex::new(None)),
            closing: CancellationToken::new(),
            options,
        }
    }

    pub fn gate(&self) -> &ConfirmationGate {
        &self.gate
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    /// Opens the camera. On failure the capture stays unusable until this is
    /// called again.
    pub async fn acquire_camera(&self, source: &dyn CameraSource) -> Result<(), WorkflowError> {
        let mut slot = self.stream.lock().await;
        // Release the old device before asking for it again.
        slot.take();

        match source.acquire(self.options.constraints).await {
            Ok(stream) => {
                let description = stream.describe();
                log_info!("Camera ready: {description}");
                *slot = Some(stream);
                self.presenter
                    .emit(&KioskEvent::CameraReady { description });
                Ok(())
            }
            Err(err) => {
                log_error!("Camera acquisition failed: {err}");
                self.report_failure(&err);
                Err(err)
            }
        }
    }

    pub async fn has_camera(&self) -> bool {
        self.stream.lock().await.is_some()
    }

    pub async fn release_camera(&self) {
        self.stream.lock().await.take();
    }

    pub async fn confirm(&self) -> bool {
        self.gate.confirm().await
    }

    pub async fn cancel(&self) -> bool {
        self.gate.cancel().await
    }

    pub async fn dismiss_notice(&self) -> bool {
        self.notices.dismiss().await
    }

    /// Stops whatever attempt is in flight and any countdown. Attempts
    /// started afterwards end as `Cancelled` right away.
    pub async fn shutdown(&self) {
        {
            let mut active = self.active.lock().await;
            self.closing.cancel();
            active.take();
        }
        self.gate.shutdown().await;
        self.release_camera().await;
    }

    /// Runs one capture attempt to its end. An attempt still in flight is
    /// cancelled first, including a countdown it may be in.
    pub async fn start_attempt(&self, context: CaptureContext, pre_scan: bool) -> AttemptReport {
        let attempt_id = Uuid::new_v4().to_string();
        let token = self.closing.child_token();

        {
            let mut active = self.active.lock().await;
            if self.closing.is_cancelled() {
                log_info!("Attempt {attempt_id} not started, workflow is shutting down");
                let mut report = AttemptReport::new(&attempt_id);
                report.status = AttemptStatus::Cancelled;
                return report;
            }
            if let Some(previous) = active.take() {
                log_info!("Attempt {} superseded by {attempt_id}", previous.id);
                previous.token.cancel();
            }
            self.gate.supersede().await;
            *active = Some(ActiveAttempt {
                id: attempt_id.clone(),
                token: token.clone(),
            });
        }

        self.journal_insert(AttemptRecord::begin(
            attempt_id.clone(),
            context.field(),
            context.course(),
            Utc::now(),
        ))
        .await;

        let mut report = AttemptReport::new(&attempt_id);
        match self.run(&context, pre_scan, &token, &mut report).await {
            Ok(()) => {}
            Err(err) => {
                log_warn!("Attempt {attempt_id} failed: {err}");
                self.report_failure(&err);
                report.status = AttemptStatus::Failed;
                report.error = Some(err);
            }
        }

        {
            let mut active = self.active.lock().await;
            if active.as_ref().is_some_and(|a| a.id == attempt_id) {
                *active = None;
            }
        }

        let message = report
            .outcome
            .as_ref()
            .map(|outcome| outcome.message.clone())
            .or_else(|| report.error.as_ref().map(|err| err.to_string()));
        self.journal_update(&attempt_id, report.status, None, None, message)
            .await;

        report
    }

    async fn run(
        &self,
        context: &CaptureContext,
        pre_scan: bool,
        token: &CancellationToken,
        report: &mut AttemptReport,
    ) -> Result<(), WorkflowError> {
        let attempt_id = report.attempt_id.clone();

        if pre_scan {
            let countdown = self.scan_countdown(&attempt_id, context.delay_seconds());
            if until_cancelled(token, countdown).await.is_none() {
                report.status = self.interrupted_status();
                return Ok(());
            }
        }

        self.presenter.emit(&KioskEvent::Scanning {
            attempt_id: attempt_id.clone(),
        });

        let Some(image) = until_cancelled(token, self.capture()).await else {
            report.status = self.interrupted_status();
            return Ok(());
        };
        let image = image?;

        let matching = request_match(self.server.as_ref(), &image, context);
        let Some(result) = until_cancelled(token, matching).await else {
            report.status = self.interrupted_status();
            return Ok(());
        };
        let result = result?;

        let student = match (result.status, result.student) {
            (MatchStatus::Match, Some(student)) => student,
            (status, _) => {
                let err = if status == MatchStatus::NoFace {
                    WorkflowError::NoFace
                } else {
                    WorkflowError::NoMatch
                };
                self.notices
                    .show(NoticeLevel::Warning, err.user_message())
                    .await;
                report.status = AttemptStatus::NoMatch;
                return Ok(());
            }
        };

        self.presenter.emit(&KioskEvent::StudentMatched {
            attempt_id: attempt_id.clone(),
            student: student.clone(),
        });
        report.student = Some(student.clone());
        self.journal_update(
            &attempt_id,
            AttemptStatus::Counting,
            Some(student.user_id.to_string()),
            Some(student.display_name.clone()),
            None,
        )
        .await;

        let pending = {
            // Holding `active` keeps a newer attempt from slipping in between
            // the cancellation check and the gate start.
            let _active = self.active.lock().await;
            if token.is_cancelled() {
                report.status = self.interrupted_status();
                return Ok(());
            }
            self.gate.start(&attempt_id, context.delay_seconds()).await?
        };

        match pending.outcome().await {
            GateOutcome::Confirmed(_) => {}
            GateOutcome::Cancelled(CancelReason::Superseded) => {
                report.status = AttemptStatus::Superseded;
                return Ok(());
            }
            GateOutcome::Cancelled(reason) => {
                if reason == CancelReason::User {
                    self.notices
                        .show(
                            NoticeLevel::Info,
                            "Attendance cancelled. Start a new scan to try again.",
                        )
                        .await;
                }
                report.status = AttemptStatus::Cancelled;
                return Ok(());
            }
        }

        // Confirmed: the submission runs to completion even if a newer
        // capture starts meanwhile.
        let outcome = submit(self.server.as_ref(), &student.user_id, context).await?;
        report.status = match outcome.rejection() {
            None => {
                let path = context.dashboard_path();
                self.presenter
                    .emit(&KioskEvent::Navigate { path: path.clone() });
                report.navigated_to = Some(path);
                AttemptStatus::Marked
            }
            Some(rejection) => {
                log_info!("Attempt {attempt_id} rejected: {}", rejection.kind());
                self.notices
                    .show(NoticeLevel::Warning, rejection.user_message())
                    .await;
                if outcome.status == OutcomeStatus::Closed {
                    AttemptStatus::Closed
                } else {
                    AttemptStatus::AlreadyMarked
                }
            }
        };
        report.outcome = Some(outcome);
        Ok(())
    }

    async fn scan_countdown(&self, attempt_id: &str, delay_secs: u32) {
        for remaining_secs in (1..=delay_secs).rev() {
            self.presenter.emit(&KioskEvent::ScanCountdown {
                attempt_id: attempt_id.to_string(),
                remaining_secs,
            });
            time::sleep(self.options.tick_interval).await;
        }
    }

    async fn capture(&self) -> Result<ImagePayload, WorkflowError> {
        let mut slot = self.stream.lock().await;
        let stream = slot.as_mut().ok_or_else(|| {
            WorkflowError::DeviceUnavailable("no camera stream, retry the camera".into())
        })?;
        self.options.capturer.capture(&mut **stream).await
    }

    /// Status for an attempt whose token fired: shutdown or a newer capture.
    fn interrupted_status(&self) -> AttemptStatus {
        if self.closing.is_cancelled() {
            AttemptStatus::Cancelled
        } else {
            AttemptStatus::Superseded
        }
    }

        fn report_failure(&self, err: &WorkflowError) {
        self.presenter.emit(&KioskEvent::Failure {
            kind: err.kind().to_string(),
            message: err.user_message(),
        });
    }

    async fn journal_insert(&self, record: AttemptRecord) {
        if let Some(journal) = &self.journal {
            if let Err(err) = journal.insert_attempt(&record).await {
                log_error!("Failed to journal attempt {}: {err:?}", record.id);
            }
        }
    }

    async fn journal_update(
        &self,
        attempt_id: &str,
        status: AttemptStatus,
        user_id: Option<String>,
        display_name: Option<String>,
        message: Option<String>,
    ) {
        if let Some(journal) = &self.journal {
            if let Err(err) = journal
                .update_attempt(attempt_id, status, user_id, display_name, message, Utc::now())
                .await
            {
                log_error!("Failed to update journal for attempt {attempt_id}: {err:?}");
            }
        }
    }
}

/// Runs `future` unless `token` is cancelled first.
async fn until_cancelled<F: Future>(token: &CancellationToken, future: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        output = future => Some(output),
    }
}
