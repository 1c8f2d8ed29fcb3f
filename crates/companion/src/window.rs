//! Event windows captured around detected events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CompanionError;
use crate::features::WindowFeatures;
use helmet_protocol::{elapsed_ms, EventKind, ImuSample, Millis};

/// Samples before and after one detected event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventWindow {
    pub id: Uuid,
    /// Companion wall clock when the trigger arrived
    pub captured_at: DateTime<Utc>,
    /// Device timestamp of the triggering event
    pub trigger_timestamp_ms: Millis,
    pub kind: EventKind,
    pub confidence: f32,
    /// Peak acceleration magnitude reported by the device (g)
    pub peak_accel: f32,
    /// Peak jerk reported by the device (g/s)
    pub peak_jerk: f32,
    /// Samples before the trigger, oldest first
    pub pre: Vec<ImuSample>,
    /// Samples after the trigger, oldest first
    pub post: Vec<ImuSample>,
    /// Post samples still to collect before the window is complete
    post_target: usize,
}

impl EventWindow {
    pub(crate) fn open(
        kind: EventKind,
        trigger_timestamp_ms: Millis,
        confidence: f32,
        peak_accel: f32,
        peak_jerk: f32,
        pre: Vec<ImuSample>,
        post_target: usize,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            captured_at: Utc::now(),
            trigger_timestamp_ms,
            kind,
            confidence,
            peak_accel,
            peak_jerk,
            pre,
            post: Vec::with_capacity(post_target),
            post_target,
        }
    }

    /// Add one post-trigger sample. Returns whether the window is now complete.
    pub(crate) fn push_post(&mut self, sample: ImuSample) -> bool {
        if !self.is_complete() {
            self.post.push(sample);
        }
        self.is_complete()
    }

    /// Fold a second report of the same event into this window
    pub(crate) fn merge_trigger(&mut self, confidence: f32, peak_accel: f32, peak_jerk: f32) {
        self.confidence = self.confidence.max(confidence);
        self.peak_accel = self.peak_accel.max(peak_accel);
        self.peak_jerk = self.peak_jerk.max(peak_jerk);
    }

    pub fn is_complete(&self) -> bool {
        self.post.len() >= self.post_target
    }

    /// Full sample sequence, oldest first
    pub fn samples(&self) -> Vec<ImuSample> {
        self.pre.iter().chain(self.post.iter()).copied().collect()
    }

    /// Time covered by the captured samples (ms)
    pub fn duration_ms(&self) -> u32 {
        let first = self.pre.first().or(self.post.first());
        let last = self.post.last().or(self.pre.last());
        match (first, last) {
            (Some(first), Some(last)) => elapsed_ms(last.timestamp_ms, first.timestamp_ms),
            _ => 0,
        }
    }

    /// Labeling features over the full sequence
    pub fn features(&self) -> WindowFeatures {
        WindowFeatures::from_samples(&self.samples())
    }

    /// Pretty JSON for export
    pub fn to_json(&self) -> Result<String, CompanionError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Compact bytes for hand-off to persistence
    pub fn to_bytes(&self) -> Result<Vec<u8>, CompanionError> {
        Ok(postcard::to_allocvec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CompanionError> {
        Ok(postcard::from_bytes(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(ts: Millis, g: f32) -> ImuSample {
        ImuSample::new(ts, [0.0, 0.0, g], [0.0; 3])
    }

    fn window() -> EventWindow {
        let pre = (0..3).map(|i| sample(i * 10, 1.0)).collect();
        EventWindow::open(EventKind::Bump, 30, 0.6, 2.8, 180.0, pre, 2)
    }

    #[test]
    fn test_completes_after_post_samples() {
        let mut window = window();
        assert!(!window.is_complete());
        assert!(!window.push_post(sample(30, 2.8)));
        assert!(window.push_post(sample(40, 1.0)));
        // Extra samples are not captured
        window.push_post(sample(50, 1.0));
        assert_eq!(window.post.len(), 2);
        assert_eq!(window.samples().len(), 5);
        assert_eq!(window.duration_ms(), 40);
        assert_eq!(window.features().sample_count, 5);
    }

    #[test]
    fn test_merge_keeps_peaks() {
        let mut window = window();
        window.merge_trigger(0.4, 5.5, 100.0);
        assert_eq!(window.confidence, 0.6);
        assert_eq!(window.peak_accel, 5.5);
        assert_eq!(window.peak_jerk, 180.0);
    }

    #[test]
    fn test_export_formats() {
        let mut window = window();
        window.push_post(sample(30, 2.8));

        let json = window.to_json().unwrap();
        assert!(json.contains("\"kind\": \"Bump\""));
        assert!(json.contains(&window.id.to_string()));

        let bytes = window.to_bytes().unwrap();
        let restored = EventWindow::from_bytes(&bytes).unwrap();
        assert_eq!(restored, window);
    }

    #[test]
    fn test_unique_ids() {
        assert_ne!(window().id, window().id);
    }
}
