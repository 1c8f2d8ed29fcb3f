//! Outcomes and notifications emitted by the state machine

use helmet_protocol::{Command, DetectedEvent, EventKind, HelmetState, Millis};
use serde::{Deserialize, Serialize};

/// Result of applying one app command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandOutcome {
    /// Command changed the state machine
    Applied,
    /// Command was valid but had nothing to do
    NoOp,
    /// Command is not accepted in the current state (not acknowledged)
    Rejected,
    /// False alarm arrived after the crash timer expired
    TimerConflict,
}

/// What caused a state change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionCause {
    Event(EventKind),
    Command(Command),
    BrakeExpired,
    Reset,
}

/// Outbox entry, drained by a single dispatcher once per tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Notification {
    /// Reported state changed
    StateChanged {
        from: HelmetState,
        to: HelmetState,
        at_ms: Millis,
        cause: TransitionCause,
    },
    /// Reportable event onset
    Event(DetectedEvent),
    /// Crash detected; must reach the companion
    CrashAlert { timestamp_ms: Millis, peak_accel: f32 },
    /// Nobody cancelled the crash alert in time
    CrashEscalated {
        entered_at_ms: Millis,
        escalated_at_ms: Millis,
        peak_accel: f32,
    },
    /// Rider cancelled the crash alert
    CrashCancelled { at_ms: Millis },
}
