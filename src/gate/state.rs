use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum GateStatus {
    #[default]
    Idle,
    Counting,
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ConfirmTrigger {
    /// The countdown reached zero without operator input.
    Timeout,
    User,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CancelReason {
    User,
    /// A newer capture started while this one was counting.
    Superseded,
    Shutdown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "status", content = "by")]
pub enum GateOutcome {
    Confirmed(ConfirmTrigger),
    Cancelled(CancelReason),
}

impl GateOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, GateOutcome::Confirmed(_))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GateState {
    pub status: GateStatus,
    pub attempt_id: Option<String>,
    pub delay_secs: u32,
    pub remaining_secs: u32,
    pub ticks: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub outcome: Option<GateOutcome>,
}

impl GateState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_counting(&self) -> bool {
        self.status == GateStatus::Counting
    }

    pub fn is_counting_for(&self, attempt_id: &str) -> bool {
        self.is_counting() && self.attempt_id.as_deref() == Some(attempt_id)
    }

    pub fn begin(&mut self, attempt_id: String, delay_secs: u32, start_at: DateTime<Utc>) {
        *self = Self {
            status: GateStatus::Counting,
            attempt_id: Some(attempt_id),
            delay_secs,
            remaining_secs: delay_secs,
            ticks: 0,
            started_at: Some(start_at),
            outcome: None,
        };
    }

    /// Advances one second. Returns true once the countdown has run out.
    pub fn tick(&mut self) -> bool {
        if !self.is_counting() {
            return false;
        }
        self.ticks = self.ticks.saturating_add(1);
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        self.remaining_secs == 0
    }

    /// Moves `Counting` to its terminal state. Any other state is left alone
    /// and `false` is returned, so a gate resolves at most once.
    pub fn resolve(&mut self, outcome: GateOutcome) -> bool {
        if !self.is_counting() {
            return false;
        }
        self.status = match outcome {
            GateOutcome::Confirmed(_) => GateStatus::Confirmed,
            GateOutcome::Cancelled(_) => GateStatus::Cancelled,
        };
        self.outcome = Some(outcome);
        true
    }
}
