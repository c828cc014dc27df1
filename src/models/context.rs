use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;

/// Confirmation delay used when nothing valid is configured.
pub const DESKTOP_DEFAULT_DELAY_SECS: u32 = 5;
pub const MOBILE_DEFAULT_DELAY_SECS: u32 = 7;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum DeviceClass {
    #[default]
    Desktop,
    Mobile,
}

impl DeviceClass {
    /// Handhelds get a longer window: their camera and network pipelines are slower.
    pub fn default_delay_secs(self) -> u32 {
        match self {
            DeviceClass::Desktop => DESKTOP_DEFAULT_DELAY_SECS,
            DeviceClass::Mobile => MOBILE_DEFAULT_DELAY_SECS,
        }
    }

    pub fn from_user_agent(user_agent: &str) -> Self {
        let lowered = user_agent.to_ascii_lowercase();
        if lowered.contains("mobi") || lowered.contains("android") {
            DeviceClass::Mobile
        } else {
            DeviceClass::Desktop
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "desktop" => Some(DeviceClass::Desktop),
            "mobile" => Some(DeviceClass::Mobile),
            _ => None,
        }
    }
}

/// Picks the confirmation delay: a configured value wins when it is at least
/// one second, otherwise the device-class default applies.
pub fn resolve_delay(configured: Option<u32>, device: DeviceClass) -> u32 {
    match configured {
        Some(secs) if secs >= 1 => secs,
        _ => device.default_delay_secs(),
    }
}

/// Same as [`resolve_delay`] for a delay typed into a selector.
pub fn resolve_delay_text(configured: &str, device: DeviceClass) -> u32 {
    resolve_delay(configured.trim().parse().ok(), device)
}

/// Field/course selection plus the confirmation delay, scoping one capture attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CaptureContext {
    field: String,
    course: String,
    delay_seconds: u32,
}

impl CaptureContext {
    pub fn new(
        field: impl Into<String>,
        course: impl Into<String>,
        delay_seconds: u32,
    ) -> Result<Self, WorkflowError> {
        let field = field.into();
        let course = course.into();

        if field.trim().is_empty() {
            return Err(WorkflowError::InvalidContext("select a field first".into()));
        }
        if course.trim().is_empty() {
            return Err(WorkflowError::InvalidContext("select a course".into()));
        }
        if delay_seconds == 0 {
            return Err(WorkflowError::InvalidContext(
                "delay must be at least one second".into(),
            ));
        }

        Ok(Self {
            field,
            course,
            delay_seconds,
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn course(&self) -> &str {
        &self.course
    }

    pub fn delay_seconds(&self) -> u32 {
        self.delay_seconds
    }

    /// Where a successful submission sends the operator. Values are used verbatim.
    pub fn dashboard_path(&self) -> String {
        format!("/attendance-dashboard/{}/{}", self.field, self.course)
    }
}
