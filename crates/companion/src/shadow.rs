//! Shadow copy of the helmet state

use helmet_protocol::{Command, DetectedEvent, EventKind, HelmetState, Millis};
use helmet_state::transition;
use serde::{Deserialize, Serialize};

/// Companion's view of the helmet.
///
/// Values reported by the device are authoritative and always win.
/// Predictions made locally (after sending a command or seeing an event)
/// are shown immediately but flagged until the next sensor frame confirms
/// or overrides them.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ShadowState {
    pub state: HelmetState,
    /// Whether `state` came from the device rather than a prediction
    pub authoritative: bool,
    /// Device timestamp of the last confirming frame
    pub device_time_ms: Option<Millis>,
    /// Most recent reported event
    pub last_event: Option<DetectedEvent>,
}

impl ShadowState {
    /// Apply a device-reported state. Returns whether anything changed.
    pub fn confirm(&mut self, state: HelmetState, device_time_ms: Millis) -> bool {
        let changed = self.state != state || !self.authoritative;
        self.state = state;
        self.authoritative = true;
        self.device_time_ms = Some(device_time_ms);
        changed
    }

    /// Predict the effect of a command sent to the device
    pub fn predict_command(&mut self, command: Command) -> bool {
        self.predict(transition::predict_command(self.state, command))
    }

    /// Predict the effect of an event reported by the device
    pub fn predict_event(&mut self, event: &DetectedEvent) -> bool {
        self.last_event = Some(*event);
        self.predict(transition::predict_event(self.state, event.kind))
    }

    fn predict(&mut self, next: HelmetState) -> bool {
        if next == self.state {
            return false;
        }
        self.state = next;
        self.authoritative = false;
        true
    }

    /// Whether the shadow believes a crash alert is active
    pub fn in_crash_alert(&self) -> bool {
        self.state == HelmetState::CrashAlert
    }

    /// Kind of the most recent event, if any
    pub fn last_event_kind(&self) -> Option<EventKind> {
        self.last_event.map(|e| e.kind)
    }
}
