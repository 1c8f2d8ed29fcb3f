//! Local alerting hook
//!
//! Escalated crashes and undeliverable crash alerts are the only failures
//! that must reach the rider directly.

use tracing::error;

use crate::error::LinkError;
use helmet_protocol::Millis;

/// Collaborator told about unconfirmed crashes and delivery failures
pub trait LocalAlerting {
    /// Crash alert was not cancelled within the confirmation window
    fn crash_escalated(&mut self, entered_at_ms: Millis, escalated_at_ms: Millis, peak_accel: f32);

    /// Crash alert could not be delivered to the companion
    fn delivery_failed(&mut self, error: &LinkError);
}

/// Alerting that only logs, counting what it saw
#[derive(Debug, Default)]
pub struct LogAlerting {
    pub escalations: usize,
    pub delivery_failures: usize,
}

impl LocalAlerting for LogAlerting {
    fn crash_escalated(&mut self, entered_at_ms: Millis, escalated_at_ms: Millis, peak_accel: f32) {
        self.escalations += 1;
        error!(
            "CRASH ESCALATED: alert raised at {}ms (peak {:.2} g) unanswered at {}ms",
            entered_at_ms, peak_accel, escalated_at_ms
        );
    }

    fn delivery_failed(&mut self, error: &LinkError) {
        self.delivery_failures += 1;
        error!("Crash alert delivery failed: {}", error);
    }
}
