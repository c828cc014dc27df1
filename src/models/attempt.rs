use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AttemptStatus {
    Scanning,
    Counting,
    NoMatch,
    Cancelled,
    Superseded,
    Marked,
    AlreadyMarked,
    Closed,
    Failed,
    Interrupted,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Scanning => "Scanning",
            AttemptStatus::Counting => "Counting",
            AttemptStatus::NoMatch => "NoMatch",
            AttemptStatus::Cancelled => "Cancelled",
            AttemptStatus::Superseded => "Superseded",
            AttemptStatus::Marked => "Marked",
            AttemptStatus::AlreadyMarked => "AlreadyMarked",
            AttemptStatus::Closed => "Closed",
            AttemptStatus::Failed => "Failed",
            AttemptStatus::Interrupted => "Interrupted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttemptStatus::Scanning | AttemptStatus::Counting)
    }
}

/// One capture attempt as recorded in the local journal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub id: String,
    pub field: String,
    pub course: String,
    pub status: AttemptStatus,
    pub user_id: Option<String>,
    pub display_name: Option<String>,
    pub message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl AttemptRecord {
    pub fn begin(id: String, field: &str, course: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            field: field.to_string(),
            course: course.to_string(),
            status: AttemptStatus::Scanning,
            user_id: None,
            display_name: None,
            message: None,
            started_at,
            finished_at: None,
        }
    }
}
