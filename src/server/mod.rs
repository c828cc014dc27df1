use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;
use crate::models::Identifier;

pub mod http;

pub use http::HttpAttendanceServer;

/// Endpoint paths, relative to the server URL so a mount prefix is kept.
pub const SCAN_FACE_PATH: &str = "scan-face";
pub const MARK_ATTENDANCE_PATH: &str = "mark-attendance";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanRequest {
    pub image: String,
    pub field: String,
    pub course: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanResponse {
    pub status: String,
    #[serde(default)]
    pub user_id: Option<Identifier>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub roll: Option<Identifier>,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub course: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarkRequest {
    pub user_id: Identifier,
    pub field: String,
    pub course: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarkResponse {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// The attendance server, reached through its two JSON endpoints. One call is
/// one round-trip; implementations never retry.
#[async_trait]
pub trait AttendanceServer: Send + Sync {
    async fn scan_face(&self, request: &ScanRequest) -> Result<ScanResponse, WorkflowError>;

    async fn mark_attendance(&self, request: &MarkRequest)
        -> Result<MarkResponse, WorkflowError>;
}
