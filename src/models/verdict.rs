use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;

/// User ids and roll numbers come back as JSON numbers from some servers and
/// strings from others; either is echoed back unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum Identifier {
    Number(i64),
    Text(String),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Number(value) => write!(f, "{value}"),
            Identifier::Text(value) => f.write_str(value),
        }
    }
}

impl From<i64> for Identifier {
    fn from(value: i64) -> Self {
        Identifier::Number(value)
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Identifier::Text(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MatchStatus {
    Match,
    NoMatch,
    NoFace,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MatchedStudent {
    pub user_id: Identifier,
    pub display_name: String,
    pub roll: Option<Identifier>,
    pub field: String,
    pub course: String,
}

/// The server's verdict for one captured frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub status: MatchStatus,
    pub student: Option<MatchedStudent>,
}

impl MatchResult {
    pub fn matched(student: MatchedStudent) -> Self {
        Self {
            status: MatchStatus::Match,
            student: Some(student),
        }
    }

    pub fn unmatched(status: MatchStatus) -> Self {
        Self {
            status,
            student: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum OutcomeStatus {
    Success,
    AlreadyMarked,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceOutcome {
    pub status: OutcomeStatus,
    pub message: String,
}

impl AttendanceOutcome {
    /// The business-rule rejection this outcome stands for, if any.
    pub fn rejection(&self) -> Option<WorkflowError> {
        match self.status {
            OutcomeStatus::Success => None,
            OutcomeStatus::AlreadyMarked => Some(WorkflowError::AlreadyMarked(self.message.clone())),
            OutcomeStatus::Closed => Some(WorkflowError::Closed(self.message.clone())),
        }
    }
}
