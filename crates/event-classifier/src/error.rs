//! Classification Error Types

use thiserror::Error;

/// Reasons a sample is skipped instead of classified
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassifierError {
    /// Value out of the sensor's physical range, or not finite
    #[error("Stale sample: {field} value {value} is out of range [{min}, {max}]")]
    StaleSample {
        field: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },

    /// Timestamp went backwards
    #[error("Stale sample: timestamp {current}ms precedes previous {previous}ms")]
    NonMonotonic { previous: u32, current: u32 },
}
