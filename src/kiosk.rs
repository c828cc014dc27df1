use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt},
    task::JoinSet,
};

use crate::camera::CameraSource;
use crate::models::CaptureContext;
use crate::workflow::{AttemptReport, AttendanceWorkflow};
use crate::{log_info, log_warn};

const ENABLE_LOGS: bool = true;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KioskCommand {
    Scan,
    Confirm,
    Cancel,
    Dismiss,
    Retry,
    Quit,
}

impl KioskCommand {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "s" | "scan" => Some(KioskCommand::Scan),
            "y" | "confirm" => Some(KioskCommand::Confirm),
            "n" | "cancel" => Some(KioskCommand::Cancel),
            "d" | "dismiss" => Some(KioskCommand::Dismiss),
            "r" | "retry" => Some(KioskCommand::Retry),
            "q" | "quit" | "exit" => Some(KioskCommand::Quit),
            _ => None,
        }
    }
}

/// Interactive attendance desk: reads operator commands line by line and
/// drives the workflow. Attempts run as tasks so confirm and cancel stay
/// responsive during a countdown; every task is awaited on shutdown.
pub struct Kiosk {
    workflow: AttendanceWorkflow,
    camera: Arc<dyn CameraSource>,
    context: CaptureContext,
    attempts: JoinSet<AttemptReport>,
}

impl Kiosk {
    pub fn new(
        workflow: AttendanceWorkflow,
        camera: Arc<dyn CameraSource>,
        context: CaptureContext,
    ) -> Self {
        Self {
            workflow,
            camera,
            context,
            attempts: JoinSet::new(),
        }
    }

    pub async fn run<R>(mut self, input: R, auto_scan: bool) -> Result<Vec<AttemptReport>>
    where
        R: AsyncBufRead + Unpin,
    {
        // A camera failure is reported by the workflow; the operator can retry.
        let _ = self.workflow.acquire_camera(self.camera.as_ref()).await;

        if auto_scan && self.workflow.has_camera().await {
            self.start_attempt(true);
        }

        let mut lines = input.lines();
        while let Some(line) = lines
            .next_line()
            .await
            .context("failed to read kiosk input")?
        {
            if line.trim().is_empty() {
                continue;
            }
            let Some(command) = KioskCommand::parse(&line) else {
                eprintln!("unknown command '{}', try s/y/n/d/r/q", line.trim());
                continue;
            };
            if !self.dispatch(command).await {
                break;
            }
        }

        Ok(self.shutdown().await)
    }

    /// Applies one command. Returns false once the kiosk should stop.
    pub async fn dispatch(&mut self, command: KioskCommand) -> bool {
        match command {
            KioskCommand::Scan => self.start_attempt(false),
            KioskCommand::Confirm => {
                if !self.workflow.confirm().await {
                    log_warn!("Nothing to confirm");
                }
            }
            KioskCommand::Cancel => {
                if !self.workflow.cancel().await {
                    log_warn!("Nothing to cancel");
                }
            }
            KioskCommand::Dismiss => {
                self.workflow.dismiss_notice().await;
            }
            KioskCommand::Retry => {
                let _ = self.workflow.acquire_camera(self.camera.as_ref()).await;
            }
            KioskCommand::Quit => return false,
        }
        true
    }

    fn start_attempt(&mut self, pre_scan: bool) {
        // Reap finished attempts so the set only tracks live ones.
        while self.attempts.try_join_next().is_some() {}

        let workflow = self.workflow.clone();
        let context = self.context.clone();
        // Older tasks keep running: the workflow cancels them unless they
        // are already submitting, and a submission must finish.
        self.attempts.spawn(async move {
            let report = workflow.start_attempt(context, pre_scan).await;
            log_info!(
                "Attempt {} finished as {}",
                report.attempt_id,
                report.status.as_str()
            );
            report
        });
    }

    /// Stops the workflow and waits for every attempt, including a
    /// confirmed one still submitting. Reports come back in completion order.
    pub async fn shutdown(&mut self) -> Vec<AttemptReport> {
        self.workflow.shutdown().await;

        let mut reports = Vec::new();
        while let Some(joined) = self.attempts.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(err) => log_warn!("Attempt task ended abnormally: {err}"),
            }
        }
        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_and_long_commands() {
        assert_eq!(KioskCommand::parse("s"), Some(KioskCommand::Scan));
        assert_eq!(KioskCommand::parse(" Confirm "), Some(KioskCommand::Confirm));
        assert_eq!(KioskCommand::parse("n"), Some(KioskCommand::Cancel));
        assert_eq!(KioskCommand::parse("retry"), Some(KioskCommand::Retry));
        assert_eq!(KioskCommand::parse("exit"), Some(KioskCommand::Quit));
        assert_eq!(KioskCommand::parse("maybe"), None);
    }
}
