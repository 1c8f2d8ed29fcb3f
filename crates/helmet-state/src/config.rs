//! State machine configuration

use serde::{Deserialize, Serialize};

/// Timing policy for the state machine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateMachineConfig {
    /// Time the rider has to cancel a crash alert before it escalates (ms)
    pub crash_confirmation_ms: u32,
    /// Brake light duration after the last Brake event (ms)
    pub brake_flash_ms: u32,
    /// Forward Brake/Bump/Turn onsets as event notifications, not only crashes
    pub report_transient_events: bool,
}

impl Default for StateMachineConfig {
    fn default() -> Self {
        Self {
            crash_confirmation_ms: 30_000,
            brake_flash_ms: 3_000,
            report_transient_events: true,
        }
    }
}
