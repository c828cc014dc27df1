use std::{sync::Arc, time::Duration};

use chrono::Utc;
use log::{debug, info};
use serde::Serialize;
use tokio::{
    sync::{oneshot, Mutex},
    task::JoinHandle,
    time::{self, Instant},
};

use crate::error::WorkflowError;
use crate::presenter::{KioskEvent, Presenter};

use super::{CancelReason, ConfirmTrigger, GateOutcome, GateState};

#[derive(Debug, Serialize, Clone)]
pub struct GateSnapshot {
    pub state: GateState,
    pub ticker_active: bool,
}

/// Ticker task of the attempt it counts for.
struct Ticker {
    attempt_id: String,
    handle: JoinHandle<()>,
}

struct Slot {
    state: GateState,
    resolver: Option<oneshot::Sender<GateOutcome>>,
    ticker: Option<Ticker>,
}

/// Waits for the gate started for one attempt to resolve.
pub struct PendingConfirmation {
    attempt_id: String,
    receiver: oneshot::Receiver<GateOutcome>,
}

impl PendingConfirmation {
    pub fn attempt_id(&self) -> &str {
        &self.attempt_id
    }

    pub async fn outcome(self) -> GateOutcome {
        self.receiver
            .await
            .unwrap_or(GateOutcome::Cancelled(CancelReason::Shutdown))
    }
}

/// Countdown that commits automatically at zero unless the operator cancels
/// first. State, outcome sender and ticker share one lock, so resolving a
/// gate and stopping its ticker cannot interleave with a newer start.
#[derive(Clone)]
pub struct ConfirmationGate {
    slot: Arc<Mutex<Slot>>,
    tick_interval: Duration,
    presenter: Arc<dyn Presenter>,
}

impl ConfirmationGate {
    pub fn new(presenter: Arc<dyn Presenter>) -> Self {
        Self::with_tick_interval(presenter, Duration::from_secs(1))
    }

    pub fn with_tick_interval(presenter: Arc<dyn Presenter>, tick_interval: Duration) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot {
                state: GateState::new(),
                resolver: None,
                ticker: None,
            })),
            tick_interval,
            presenter,
        }
    }

    pub async fn get_state(&self) -> GateState {
        self.slot.lock().await.state.clone()
    }

    pub async fn get_snapshot(&self) -> GateSnapshot {
        let slot = self.slot.lock().await;
        GateSnapshot {
            state: slot.state.clone(),
            ticker_active: slot
                .ticker
                .as_ref()
                .is_some_and(|ticker| !ticker.handle.is_finished()),
        }
    }

    /// Enters `Counting` for `attempt_id`. A gate still counting for an
    /// earlier attempt is cancelled as superseded first.
    pub async fn start(
        &self,
        attempt_id: &str,
        delay_secs: u32,
    ) -> Result<PendingConfirmation, WorkflowError> {
        if delay_secs == 0 {
            return Err(WorkflowError::InvalidContext(
                "confirmation delay must be at least one second".into(),
            ));
        }

        let (resolver, receiver) = oneshot::channel();
        {
            let mut slot = self.slot.lock().await;
            resolve_locked(
                &mut slot,
                GateOutcome::Cancelled(CancelReason::Superseded),
                self.presenter.as_ref(),
            );

            slot.state
                .begin(attempt_id.to_string(), delay_secs, Utc::now());
            slot.resolver = Some(resolver);

            info!("Confirmation gate counting {delay_secs}s for attempt {attempt_id}");
            self.presenter.emit(&KioskEvent::GateStarted {
                attempt_id: attempt_id.to_string(),
                delay_secs,
            });
            slot.ticker = Some(Ticker {
                attempt_id: attempt_id.to_string(),
                handle: self.spawn_ticker(attempt_id.to_string()),
            });
        }

        Ok(PendingConfirmation {
            attempt_id: attempt_id.to_string(),
            receiver,
        })
    }

    /// Operator confirmed before the countdown ran out.
    pub async fn confirm(&self) -> bool {
        self.finish(GateOutcome::Confirmed(ConfirmTrigger::User))
            .await
    }

    /// Operator cancelled. The gate does not restart on its own.
    pub async fn cancel(&self) -> bool {
        self.finish(GateOutcome::Cancelled(CancelReason::User)).await
    }

    /// Cancels whatever is counting because a new capture is starting.
    pub async fn supersede(&self) -> bool {
        self.finish(GateOutcome::Cancelled(CancelReason::Superseded))
            .await
    }

    pub async fn shutdown(&self) -> bool {
        self.finish(GateOutcome::Cancelled(CancelReason::Shutdown))
            .await
    }

    async fn finish(&self, outcome: GateOutcome) -> bool {
        let mut slot = self.slot.lock().await;
        resolve_locked(&mut slot, outcome, self.presenter.as_ref())
    }

    fn spawn_ticker(&self, attempt_id: String) -> JoinHandle<()> {
        let slot = self.slot.clone();
        let presenter = self.presenter.clone();
        let tick_interval = self.tick_interval;

        tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + tick_interval, tick_interval);
            loop {
                interval.tick().await;

                let mut guard = slot.lock().await;
                if !guard.state.is_counting_for(&attempt_id) {
                    break;
                }

                if guard.state.tick() {
                    debug!("Gate for attempt {attempt_id} ran out, auto-confirming");
                    resolve_locked(
                        &mut guard,
                        GateOutcome::Confirmed(ConfirmTrigger::Timeout),
                        presenter.as_ref(),
                    );
                    break;
                }

                presenter.emit(&KioskEvent::GateTick {
                    attempt_id: attempt_id.clone(),
                    remaining_secs: guard.state.remaining_secs,
                });
            }
        })
    }
}

/// Single place where `Counting` ends. Consumes the outcome sender, so the
/// waiting attempt sees exactly one outcome.
fn resolve_locked(slot: &mut Slot, outcome: GateOutcome, presenter: &dyn Presenter) -> bool {
    if !slot.state.resolve(outcome) {
        return false;
    }

    let attempt_id = slot.state.attempt_id.clone().unwrap_or_default();
    info!("Confirmation gate for attempt {attempt_id} resolved: {outcome:?}");

    // Only the resolved attempt's ticker stops. On timeout the ticker is the
    // caller and exits by itself, so it is released without an abort.
    if slot
        .ticker
        .as_ref()
        .is_some_and(|ticker| ticker.attempt_id == attempt_id)
    {
        if let Some(ticker) = slot.ticker.take() {
            if outcome != GateOutcome::Confirmed(ConfirmTrigger::Timeout) {
                ticker.handle.abort();
            }
        }
    }

    if let Some(resolver) = slot.resolver.take() {
        // The waiting attempt may already be gone, e.g. aborted on shutdown.
        let _ = resolver.send(outcome);
    }

    presenter.emit(&KioskEvent::GateResolved {
        attempt_id,
        outcome,
    });
    true
}
