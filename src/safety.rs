//! One-way safety latch.
//!
//! `Safe -> Tripped` happens on a hard temperature limit breach or a
//! shutdown verdict from the regime classifier. Nothing in the control loop
//! clears it; `clear()` exists for an operator-driven reset path.

use log::{debug, error, info};
use statig::prelude::*;

#[derive(Debug, Clone)]
pub enum LatchEvent {
    Trip { reason: String },
    Clear,
}

#[derive(Debug, Default)]
pub struct LatchMachine;

#[state_machine(
    initial = "State::safe()",
    state(derive(Debug, Clone, PartialEq)),
    on_transition = "Self::on_transition"
)]
impl LatchMachine {
    #[state]
    fn safe(event: &LatchEvent) -> Response<State> {
        use Response::*;

        match event {
            LatchEvent::Trip { reason } => Transition(State::tripped(reason.clone())),
            LatchEvent::Clear => Handled,
        }
    }

    #[state]
    fn tripped(reason: &mut String, event: &LatchEvent) -> Response<State> {
        use Response::*;

        match event {
            LatchEvent::Trip { reason: again } => {
                debug!("Latch already tripped ({}); ignoring: {}", reason, again);
                Handled
            }
            LatchEvent::Clear => Transition(State::safe()),
        }
    }

    fn on_transition(&mut self, source: &State, target: &State) {
        match (source, target) {
            (State::Safe {}, State::Tripped { reason }) => {
                error!("SAFETY LATCH TRIPPED: {}", reason);
            }
            (State::Tripped { reason }, State::Safe {}) => {
                info!("Safety latch cleared (was: {})", reason);
            }
            _ => {}
        }
    }
}

pub struct SafetyLatch {
    machine: StateMachine<LatchMachine>,
}

impl SafetyLatch {
    pub fn new() -> Self {
        Self {
            machine: LatchMachine.state_machine(),
        }
    }

    /// Returns `true` when this call moved the latch from safe to tripped.
    pub fn trip(&mut self, reason: impl Into<String>) -> bool {
        let was_tripped = self.is_tripped();
        self.machine.handle(&LatchEvent::Trip {
            reason: reason.into(),
        });
        !was_tripped && self.is_tripped()
    }

    /// Operator reset. Not wired into the control loop: a tripped tub stays
    /// tripped until restarted or explicitly cleared.
    pub fn clear(&mut self) {
        self.machine.handle(&LatchEvent::Clear);
    }

    pub fn is_tripped(&self) -> bool {
        matches!(self.machine.state(), State::Tripped { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self.machine.state() {
            State::Tripped { reason } => Some(reason.as_str()),
            State::Safe {} => None,
        }
    }
}

impl Default for SafetyLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SafetyLatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.reason() {
            Some(reason) => write!(f, "Tripped({})", reason),
            None => f.write_str("Safe"),
        }
    }
}
