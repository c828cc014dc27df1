pub mod attempt;
pub mod catalog;
pub mod context;
pub mod verdict;

pub use attempt::{AttemptRecord, AttemptStatus};
pub use catalog::CourseCatalog;
pub use context::{resolve_delay, resolve_delay_text, CaptureContext, DeviceClass};
pub use verdict::{
    AttendanceOutcome, Identifier, MatchResult, MatchStatus, MatchedStudent, OutcomeStatus,
};
