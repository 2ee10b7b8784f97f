//! Renewal state machine using rust-fsm.
//!
//! ```text
//! ┌──────────┐  RenewalRequired   ┌──────────┐
//! │   Idle   │ ─────────────────► │ Renewing │
//! └──────────┘                    └─────┬────┘
//!      ▲                                │
//!      └──── RenewalSucceeded / ────────┘
//!            RenewalFailed
//! ```
//!
//! There is no transition out of `Renewing` other than settling the
//! episode, so a second `RenewalRequired` while one is in flight is
//! rejected. That rejection is what makes renewal single-flight.

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub renewal_machine(Idle)

    Idle => {
        RenewalRequired => Renewing
    },
    Renewing => {
        RenewalSucceeded => Idle,
        RenewalFailed => Idle
    }
}

pub use renewal_machine::Input as RenewalInput;
pub use renewal_machine::State as RenewalMachineState;
pub use renewal_machine::StateMachine as RenewalMachine;

/// Renewal state for external consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenewalPhase {
    /// No renewal in flight.
    Idle,
    /// A renewal call is in flight; authorization failures queue behind it.
    Renewing,
}

impl From<&RenewalMachineState> for RenewalPhase {
    fn from(state: &RenewalMachineState) -> Self {
        match state {
            RenewalMachineState::Idle => RenewalPhase::Idle,
            RenewalMachineState::Renewing => RenewalPhase::Renewing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_idle() {
        let machine = RenewalMachine::new();
        assert_eq!(*machine.state(), RenewalMachineState::Idle);
        assert_eq!(RenewalPhase::from(machine.state()), RenewalPhase::Idle);
    }

    #[test]
    fn test_success_cycle() {
        let mut machine = RenewalMachine::new();

        machine.consume(&RenewalInput::RenewalRequired).unwrap();
        assert_eq!(*machine.state(), RenewalMachineState::Renewing);

        machine.consume(&RenewalInput::RenewalSucceeded).unwrap();
        assert_eq!(*machine.state(), RenewalMachineState::Idle);
    }

    #[test]
    fn test_failure_returns_to_idle() {
        let mut machine = RenewalMachine::new();

        machine.consume(&RenewalInput::RenewalRequired).unwrap();
        machine.consume(&RenewalInput::RenewalFailed).unwrap();
        assert_eq!(*machine.state(), RenewalMachineState::Idle);
    }

    #[test]
    fn test_cannot_start_second_renewal() {
        let mut machine = RenewalMachine::new();

        machine.consume(&RenewalInput::RenewalRequired).unwrap();
        let result = machine.consume(&RenewalInput::RenewalRequired);
        assert!(result.is_err());
        assert_eq!(*machine.state(), RenewalMachineState::Renewing);
    }

    #[test]
    fn test_cannot_settle_when_idle() {
        let mut machine = RenewalMachine::new();

        assert!(machine.consume(&RenewalInput::RenewalSucceeded).is_err());
        assert!(machine.consume(&RenewalInput::RenewalFailed).is_err());
        assert_eq!(*machine.state(), RenewalMachineState::Idle);
    }

    #[test]
    fn test_phase_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&RenewalPhase::Renewing).unwrap(),
            "\"renewing\""
        );
    }
}
