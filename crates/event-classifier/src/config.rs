//! Classifier configuration

use crate::validator::ValidationConfig;
use serde::{Deserialize, Serialize};

/// Thresholds and windows for event classification.
///
/// Crash and brake defaults come from the helmet firmware; bump and turn
/// values are calibration placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Smoothing window in samples
    pub window_size: usize,
    /// Nominal sampling rate (Hz)
    pub sample_rate_hz: u32,
    /// Instantaneous magnitude at or above which a sample is a crash (g)
    pub crash_g: f32,
    /// Smoothed forward deceleration for braking (g)
    pub brake_g: f32,
    /// How long deceleration must persist before it is a brake (ms)
    pub brake_dwell_ms: u32,
    /// Spike height above the smoothed magnitude for a bump (g)
    pub bump_delta_g: f32,
    /// Minimum jerk for a bump spike (g/s)
    pub bump_jerk_g_per_s: f32,
    /// One bump per spike within this window (ms)
    pub bump_window_ms: u32,
    /// Smoothed yaw rate for a turn (deg/s)
    pub turn_deg_per_sec: f32,
    /// How long rotation must persist before it is a turn (ms)
    pub turn_dwell_ms: u32,
    /// Range checks applied before classification
    pub validation: ValidationConfig,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            sample_rate_hz: 100,
            crash_g: 4.0,
            brake_g: 0.5,
            brake_dwell_ms: 100,
            bump_delta_g: 1.0,
            bump_jerk_g_per_s: 18.0,
            bump_window_ms: 150,
            turn_deg_per_sec: 120.0,
            turn_dwell_ms: 200,
            validation: ValidationConfig::default(),
        }
    }
}

impl ClassifierConfig {
    /// Tick period derived from the sampling rate (ms)
    pub fn sample_period_ms(&self) -> u32 {
        1000 / self.sample_rate_hz.max(1)
    }
}
