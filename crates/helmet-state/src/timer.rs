//! Crash confirmation timer

use helmet_protocol::{elapsed_ms, Millis};
use serde::{Deserialize, Serialize};

/// Deadline armed when a crash is detected.
///
/// Expiry is measured as elapsed time since arming, so a millisecond
/// counter that wraps between `armed_at` and `deadline` is still handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashTimer {
    pub armed_at: Millis,
    pub deadline: Millis,
}

impl CrashTimer {
    /// Arm a timer at `now` running for `duration_ms`
    pub fn arm(now: Millis, duration_ms: u32) -> Self {
        Self {
            armed_at: now,
            deadline: now.wrapping_add(duration_ms),
        }
    }

    /// Configured duration
    pub fn duration_ms(&self) -> u32 {
        elapsed_ms(self.deadline, self.armed_at)
    }

    /// Whether the deadline has been reached at `now`
    pub fn is_expired(&self, now: Millis) -> bool {
        elapsed_ms(now, self.armed_at) >= self.duration_ms()
    }

    /// Time left before expiry (0 once expired)
    pub fn remaining_ms(&self, now: Millis) -> u32 {
        self.duration_ms()
            .saturating_sub(elapsed_ms(now, self.armed_at))
    }
}
