//! Transition table over reported states.
//!
//! These functions see only the reported [`HelmetState`], not the layers
//! behind it. The state machine uses [`admits`] to reject commands; the
//! companion uses the predictors to update its shadow copy before the
//! device confirms.

use helmet_protocol::{Command, EventKind, HelmetState};

/// Whether `command` is accepted at all in `state`.
///
/// During a crash alert only the false-alarm response is accepted.
pub fn admits(state: HelmetState, command: Command) -> bool {
    match state {
        HelmetState::CrashAlert => command == Command::CrashFalseAlarm,
        _ => true,
    }
}

/// Expected reported state after `command`
pub fn predict_command(state: HelmetState, command: Command) -> HelmetState {
    use HelmetState::*;

    if !admits(state, command) {
        return state;
    }
    match (state, command) {
        // Assumes the confirmation timer is still pending
        (CrashAlert, Command::CrashFalseAlarm) => Normal,
        (_, Command::CrashFalseAlarm) => state,

        (_, Command::PartyModeOn) => Party,
        (Braking, Command::NormalMode) => Braking,
        (_, Command::NormalMode) => Normal,

        // Party ignores turn signals
        (Party, _) => Party,

        // Brake light has priority, the turn shows once it expires
        (Braking, _) => Braking,

        (_, Command::TurnLeftOn) => TurnLeft,
        (_, Command::TurnRightOn) => TurnRight,
        (TurnLeft, Command::TurnLeftOff) => Normal,
        (TurnRight, Command::TurnRightOff) => Normal,
        (_, Command::TurnLeftOff | Command::TurnRightOff) => state,
    }
}

/// Expected reported state after a classified event
pub fn predict_event(state: HelmetState, kind: EventKind) -> HelmetState {
    match (state, kind) {
        (_, EventKind::Crash) => HelmetState::CrashAlert,
        (HelmetState::CrashAlert | HelmetState::Party, _) => state,
        (_, EventKind::Brake) => HelmetState::Braking,
        _ => state,
    }
}
