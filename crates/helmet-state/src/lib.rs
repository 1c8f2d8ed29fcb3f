//! Helmet State Machine
//!
//! Owns the authoritative [`HelmetState`] on the device:
//! - crash episodes with a cancellable confirmation timer
//! - brake light windows refreshed by Brake events
//! - turn signals and party mode driven by app commands
//!
//! The [`transition`] table is shared with the companion so its shadow
//! prediction follows the same admission rules.

mod config;
mod led;
mod machine;
mod notification;
mod timer;
pub mod transition;

pub use config::StateMachineConfig;
pub use led::{LedAnimator, LedConfig, Rgb};
pub use machine::{HelmetStateMachine, TurnSide};
pub use notification::{CommandOutcome, Notification, TransitionCause};
pub use timer::CrashTimer;

pub use helmet_protocol::{Command, DetectedEvent, EventKind, HelmetState, Millis};
