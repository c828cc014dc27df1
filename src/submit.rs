use log::info;

use crate::error::WorkflowError;
use crate::models::{AttendanceOutcome, CaptureContext, Identifier, OutcomeStatus};
use crate::server::{AttendanceServer, MarkRequest, MarkResponse};

/// Commits a confirmed identity through `/mark-attendance`.
pub async fn submit(
    server: &dyn AttendanceServer,
    user_id: &Identifier,
    context: &CaptureContext,
) -> Result<AttendanceOutcome, WorkflowError> {
    let request = MarkRequest {
        user_id: user_id.clone(),
        field: context.field().to_string(),
        course: context.course().to_string(),
    };

    let response = server.mark_attendance(&request).await?;
    let outcome = interpret_mark(response)?;
    info!(
        "Attendance for user {user_id} in {}/{}: {:?}",
        context.field(),
        context.course(),
        outcome.status
    );
    Ok(outcome)
}

fn interpret_mark(response: MarkResponse) -> Result<AttendanceOutcome, WorkflowError> {
    let status = match response.status.as_str() {
        // Older servers answer `marked` instead of `success`.
        "success" | "marked" => OutcomeStatus::Success,
        "already_marked" => OutcomeStatus::AlreadyMarked,
        "closed" => OutcomeStatus::Closed,
        other => {
            return Err(WorkflowError::Protocol(format!(
                "unknown attendance status '{other}'"
            )))
        }
    };

    let message = response.message.unwrap_or_else(|| match status {
        OutcomeStatus::Success => "Attendance marked.".into(),
        OutcomeStatus::AlreadyMarked => "Attendance already marked for today.".into(),
        OutcomeStatus::Closed => "Attendance window is closed.".into(),
    });

    Ok(AttendanceOutcome { status, message })
}
