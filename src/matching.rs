use log::info;

use crate::capture::ImagePayload;
use crate::error::WorkflowError;
use crate::models::{CaptureContext, MatchResult, MatchStatus, MatchedStudent};
use crate::server::{AttendanceServer, ScanRequest, ScanResponse};

/// Sends one captured frame to `/scan-face` and interprets the verdict.
pub async fn request_match(
    server: &dyn AttendanceServer,
    image: &ImagePayload,
    context: &CaptureContext,
) -> Result<MatchResult, WorkflowError> {
    let request = ScanRequest {
        image: image.as_str().to_string(),
        field: context.field().to_string(),
        course: context.course().to_string(),
    };

    let response = server.scan_face(&request).await?;
    let result = interpret_scan(response, context)?;
    info!(
        "Scan for {}/{} returned {:?}",
        context.field(),
        context.course(),
        result.status
    );
    Ok(result)
}

fn interpret_scan(
    response: ScanResponse,
    context: &CaptureContext,
) -> Result<MatchResult, WorkflowError> {
    match response.status.as_str() {
        "match" => {
            let user_id = response
                .user_id
                .ok_or_else(|| WorkflowError::Protocol("match without user_id".into()))?;
            Ok(MatchResult::matched(MatchedStudent {
                display_name: response
                    .username
                    .unwrap_or_else(|| user_id.to_string()),
                user_id,
                roll: response.roll,
                field: response
                    .field
                    .unwrap_or_else(|| context.field().to_string()),
                course: response
                    .course
                    .unwrap_or_else(|| context.course().to_string()),
            }))
        }
        "no_match" | "no-match" => Ok(MatchResult::unmatched(MatchStatus::NoMatch)),
        "no-face" | "no_face" => Ok(MatchResult::unmatched(MatchStatus::NoFace)),
        other => Err(WorkflowError::Protocol(format!(
            "unknown scan status '{other}'"
        ))),
    }
}
