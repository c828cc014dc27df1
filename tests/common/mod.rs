#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use scanmark_lib::{
    camera::{CameraSource, RawFrame, StreamConstraints, VideoStream},
    error::WorkflowError,
    journal::AttemptJournal,
    models::Identifier,
    presenter::{KioskEvent, Presenter},
    server::{AttendanceServer, MarkRequest, MarkResponse, ScanRequest, ScanResponse},
    workflow::{AttendanceWorkflow, WorkflowOptions},
};

#[derive(Default)]
pub struct RecordingPresenter {
    events: Mutex<Vec<KioskEvent>>,
}

impl RecordingPresenter {
    pub fn events(&self) -> Vec<KioskEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, matches: impl Fn(&KioskEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| matches(e)).count()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                KioskEvent::Navigate { path } => Some(path),
                _ => None,
            })
            .collect()
    }
}

impl Presenter for RecordingPresenter {
    fn emit(&self, event: &KioskEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

pub fn matched(user_id: i64, name: &str) -> ScanResponse {
    ScanResponse {
        status: "match".into(),
        user_id: Some(Identifier::Number(user_id)),
        username: Some(name.into()),
        roll: Some(Identifier::Number(user_id + 100)),
        field: Some("CSE".into()),
        course: Some("OS".into()),
    }
}

pub fn status_only(status: &str) -> ScanResponse {
    ScanResponse {
        status: status.into(),
        ..Default::default()
    }
}

pub fn mark(status: &str, message: Option<&str>) -> MarkResponse {
    MarkResponse {
        status: status.into(),
        message: message.map(str::to_string),
    }
}

/// Scripted attendance server that counts and records every call.
pub struct FakeServer {
    scan: Mutex<Result<ScanResponse, WorkflowError>>,
    mark: Mutex<Result<MarkResponse, WorkflowError>>,
    scan_latency: Duration,
    mark_latency: Duration,
    pub scan_calls: AtomicUsize,
    pub mark_calls: AtomicUsize,
    pub marks_completed: AtomicUsize,
    pub mark_requests: Mutex<Vec<MarkRequest>>,
    pub scan_requests: Mutex<Vec<ScanRequest>>,
}

impl FakeServer {
    pub fn new(scan: ScanResponse, mark: MarkResponse) -> Self {
        Self {
            scan: Mutex::new(Ok(scan)),
            mark: Mutex::new(Ok(mark)),
            scan_latency: Duration::ZERO,
            mark_latency: Duration::ZERO,
            scan_calls: AtomicUsize::new(0),
            mark_calls: AtomicUsize::new(0),
            marks_completed: AtomicUsize::new(0),
            mark_requests: Mutex::new(Vec::new()),
            scan_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_scan_latency(mut self, latency: Duration) -> Self {
        self.scan_latency = latency;
        self
    }

    pub fn with_mark_latency(mut self, latency: Duration) -> Self {
        self.mark_latency = latency;
        self
    }

    pub fn failing_scan(self, err: WorkflowError) -> Self {
        *self.scan.lock().unwrap() = Err(err);
        self
    }

    pub fn failing_mark(self, err: WorkflowError) -> Self {
        *self.mark.lock().unwrap() = Err(err);
        self
    }

    pub fn marks(&self) -> usize {
        self.mark_calls.load(Ordering::SeqCst)
    }

    /// Mark calls that ran to the end rather than being dropped mid-flight.
    pub fn completed_marks(&self) -> usize {
        self.marks_completed.load(Ordering::SeqCst)
    }

    pub fn scans(&self) -> usize {
        self.scan_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AttendanceServer for FakeServer {
    async fn scan_face(&self, request: &ScanRequest) -> Result<ScanResponse, WorkflowError> {
        self.scan_calls.fetch_add(1, Ordering::SeqCst);
        self.scan_requests.lock().unwrap().push(request.clone());
        if !self.scan_latency.is_zero() {
            tokio::time::sleep(self.scan_latency).await;
        }
        self.scan.lock().unwrap().clone()
    }

    async fn mark_attendance(
        &self,
        request: &MarkRequest,
    ) -> Result<MarkResponse, WorkflowError> {
        self.mark_calls.fetch_add(1, Ordering::SeqCst);
        self.mark_requests.lock().unwrap().push(request.clone());
        if !self.mark_latency.is_zero() {
            tokio::time::sleep(self.mark_latency).await;
        }
        self.marks_completed.fetch_add(1, Ordering::SeqCst);
        self.mark.lock().unwrap().clone()
    }
}

pub fn test_frame() -> RawFrame {
    let (width, height) = (16u32, 12u32);
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            rgb.extend_from_slice(&[(x * 10) as u8, (y * 10) as u8, 90]);
        }
    }
    RawFrame { width, height, rgb }
}

/// Camera that always renders the same frame, or refuses to open.
pub struct FakeCamera {
    frame: Option<RawFrame>,
    available: bool,
}

impl FakeCamera {
    pub fn working() -> Self {
        Self {
            frame: Some(test_frame()),
            available: true,
        }
    }

    pub fn not_rendering() -> Self {
        Self {
            frame: None,
            available: true,
        }
    }

    pub fn denied() -> Self {
        Self {
            frame: None,
            available: false,
        }
    }
}

struct FakeStream {
    frame: Option<RawFrame>,
}

#[async_trait]
impl VideoStream for FakeStream {
    fn describe(&self) -> String {
        "fake camera".into()
    }

    async fn frame(&mut self) -> Result<Option<RawFrame>, WorkflowError> {
        Ok(self.frame.clone())
    }
}

#[async_trait]
impl CameraSource for FakeCamera {
    async fn acquire(
        &self,
        _constraints: StreamConstraints,
    ) -> Result<Box<dyn VideoStream>, WorkflowError> {
        if !self.available {
            return Err(WorkflowError::DeviceUnavailable("permission denied".into()));
        }
        Ok(Box::new(FakeStream {
            frame: self.frame.clone(),
        }))
    }
}

pub async fn workflow_with(
    server: Arc<FakeServer>,
    presenter: Arc<RecordingPresenter>,
    camera: &FakeCamera,
) -> AttendanceWorkflow {
    journaled_workflow(server, presenter, camera, None).await
}

pub async fn journaled_workflow(
    server: Arc<FakeServer>,
    presenter: Arc<RecordingPresenter>,
    camera: &FakeCamera,
    journal: Option<AttemptJournal>,
) -> AttendanceWorkflow {
    let workflow = AttendanceWorkflow::new(server, presenter, journal, WorkflowOptions::default());
    let _ = workflow.acquire_camera(camera).await;
    workflow
}

/// Polls until the confirmation gate is counting.
pub async fn wait_until_counting(workflow: &AttendanceWorkflow) {
    while !workflow.gate().get_state().await.is_counting() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
