pub mod controller;
pub mod state;

pub use controller::{ConfirmationGate, GateSnapshot, PendingConfirmation};
pub use state::{CancelReason, ConfirmTrigger, GateOutcome, GateState, GateStatus};
