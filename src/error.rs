use thiserror::Error;

/// Failures a capture attempt can end in. Every variant is handled at the
/// component boundary and turned into a user-visible message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("frame capture failed: {0}")]
    CaptureFailed(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected server response: {0}")]
    Protocol(String),
    #[error("face not recognized")]
    NoMatch,
    #[error("no face detected")]
    NoFace,
    #[error("{0}")]
    AlreadyMarked(String),
    #[error("{0}")]
    Closed(String),
    #[error("invalid capture context: {0}")]
    InvalidContext(String),
}

impl WorkflowError {
    /// Stable identifier used in kiosk events and the attempt journal.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::DeviceUnavailable(_) => "device-unavailable",
            WorkflowError::CaptureFailed(_) => "capture-failed",
            WorkflowError::Network(_) => "network",
            WorkflowError::Protocol(_) => "protocol",
            WorkflowError::NoMatch => "no-match",
            WorkflowError::NoFace => "no-face",
            WorkflowError::AlreadyMarked(_) => "already-marked",
            WorkflowError::Closed(_) => "closed",
            WorkflowError::InvalidContext(_) => "invalid-context",
        }
    }

    /// Text shown to the operator.
    pub fn user_message(&self) -> String {
        match self {
            WorkflowError::DeviceUnavailable(_) => {
                "Camera unavailable. Check the device and permissions, then retry.".into()
            }
            WorkflowError::CaptureFailed(_) => {
                "Could not capture a usable frame. Please try again.".into()
            }
            WorkflowError::Network(_) | WorkflowError::Protocol(_) => {
                "Server unreachable or returned an error. Please try again.".into()
            }
            WorkflowError::NoMatch => "Face not recognized.".into(),
            WorkflowError::NoFace => "No face detected. Please face the camera.".into(),
            WorkflowError::AlreadyMarked(message) | WorkflowError::Closed(message) => {
                message.clone()
            }
            WorkflowError::InvalidContext(detail) => format!("Invalid selection: {detail}"),
        }
    }
}

impl From<reqwest::Error> for WorkflowError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            WorkflowError::Protocol(err.to_string())
        } else {
            WorkflowError::Network(err.to_string())
        }
    }
}
