use std::io::{self, Write};

use serde::Serialize;

use crate::gate::GateOutcome;
use crate::models::MatchedStudent;
use crate::notice::NoticeLevel;

/// Everything the kiosk shows the operator.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum KioskEvent {
    #[serde(rename_all = "camelCase")]
    CameraReady { description: String },
    #[serde(rename_all = "camelCase")]
    ScanCountdown { attempt_id: String, remaining_secs: u32 },
    #[serde(rename_all = "camelCase")]
    Scanning { attempt_id: String },
    #[serde(rename_all = "camelCase")]
    StudentMatched {
        attempt_id: String,
        student: MatchedStudent,
    },
    #[serde(rename_all = "camelCase")]
    GateStarted { attempt_id: String, delay_secs: u32 },
    #[serde(rename_all = "camelCase")]
    GateTick { attempt_id: String, remaining_secs: u32 },
    #[serde(rename_all = "camelCase")]
    GateResolved {
        attempt_id: String,
        outcome: GateOutcome,
    },
    #[serde(rename_all = "camelCase")]
    NoticeShown {
        id: u64,
        level: NoticeLevel,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    NoticeCleared { id: u64 },
    #[serde(rename_all = "camelCase")]
    Navigate { path: String },
    #[serde(rename_all = "camelCase")]
    Failure { kind: String, message: String },
}

pub trait Presenter: Send + Sync {
    fn emit(&self, event: &KioskEvent);
}

/// Renders events on stdout, either as readable lines or as JSON lines.
pub struct TerminalPresenter {
    server_url: String,
    json: bool,
}

impl TerminalPresenter {
    pub fn new(server_url: impl Into<String>, json: bool) -> Self {
        Self {
            server_url: server_url.into().trim_end_matches('/').to_string(),
            json,
        }
    }

    fn render(&self, event: &KioskEvent) -> String {
        match event {
            KioskEvent::CameraReady { description } => format!("camera ready ({description})"),
            KioskEvent::ScanCountdown { remaining_secs, .. } => {
                format!("scanning in {remaining_secs}...")
            }
            KioskEvent::Scanning { .. } => "scanning face...".into(),
            KioskEvent::StudentMatched { student, .. } => {
                let roll = student
                    .roll
                    .as_ref()
                    .map(|roll| roll.to_string())
                    .unwrap_or_else(|| "-".into());
                format!(
                    "matched: {} | roll {} | {} / {}",
                    student.display_name, roll, student.field, student.course
                )
            }
            KioskEvent::GateStarted { delay_secs, .. } => format!(
                "marking attendance in {delay_secs} seconds... [y] confirm now, [n] cancel"
            ),
            KioskEvent::GateTick { remaining_secs, .. } => {
                format!("marking attendance in {remaining_secs} seconds...")
            }
            KioskEvent::GateResolved { outcome, .. } => match outcome {
                GateOutcome::Confirmed(_) => "confirmed, submitting attendance".into(),
                GateOutcome::Cancelled(_) => {
                    "attendance cancelled. start a new scan to try again".into()
                }
            },
            KioskEvent::NoticeShown { level, message, .. } => {
                format!("[{}] {message}", level.as_str())
            }
            KioskEvent::NoticeCleared { .. } => "(notice cleared)".into(),
            KioskEvent::Navigate { path } => format!("open {}{path}", self.server_url),
            KioskEvent::Failure { kind, message } => format!("error ({kind}): {message}"),
        }
    }
}

impl Presenter for TerminalPresenter {
    fn emit(&self, event: &KioskEvent) {
        let line = if self.json {
            match serde_json::to_string(event) {
                Ok(line) => line,
                Err(err) => {
                    log::error!("Failed to serialize kiosk event: {err}");
                    return;
                }
            }
        } else {
            self.render(event)
        };

        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{line}");
        let _ = stdout.flush();
    }
}
