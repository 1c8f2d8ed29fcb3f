//! Sample Validator for Range Checking

use crate::error::ClassifierError;
use sample_buffer::{elapsed_ms, ImuSample, Millis};
use serde::{Deserialize, Serialize};

/// Validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Accelerometer valid range per axis (g)
    pub accel_range_g: (f32, f32),
    /// Gyroscope valid range per axis (deg/s)
    pub gyro_range_dps: (f32, f32),
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            // MPU6500 configured at ±8g, allow headroom for saturation spikes
            accel_range_g: (-16.0, 16.0),
            gyro_range_dps: (-2000.0, 2000.0),
        }
    }
}

/// Rejects samples the pipeline must not classify
pub struct SampleValidator {
    config: ValidationConfig,
}

impl SampleValidator {
    /// Create a new validator with given config
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Validate a single value against a range
    pub fn validate_range(
        &self,
        field: &'static str,
        value: f32,
        range: (f32, f32),
    ) -> Result<(), ClassifierError> {
        // NaN fails both comparisons, so test the accepted interval instead
        if value >= range.0 && value <= range.1 {
            Ok(())
        } else {
            Err(ClassifierError::StaleSample {
                field,
                value,
                min: range.0,
                max: range.1,
            })
        }
    }

    /// Validate every axis and the timestamp order
    pub fn validate(
        &self,
        sample: &ImuSample,
        previous_ts: Option<Millis>,
    ) -> Result<(), ClassifierError> {
        let accel = self.config.accel_range_g;
        let gyro = self.config.gyro_range_dps;
        self.validate_range("accel_x", sample.accel_x, accel)?;
        self.validate_range("accel_y", sample.accel_y, accel)?;
        self.validate_range("accel_z", sample.accel_z, accel)?;
        self.validate_range("gyro_x", sample.gyro_x, gyro)?;
        self.validate_range("gyro_y", sample.gyro_y, gyro)?;
        self.validate_range("gyro_z", sample.gyro_z, gyro)?;

        if let Some(previous) = previous_ts {
            // More than half the counter range "ahead" means the clock went backwards
            if elapsed_ms(sample.timestamp_ms, previous) > Millis::MAX / 2 {
                return Err(ClassifierError::NonMonotonic {
                    previous,
                    current: sample.timestamp_ms,
                });
            }
        }
        Ok(())
    }
}

impl Default for SampleValidator {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}
