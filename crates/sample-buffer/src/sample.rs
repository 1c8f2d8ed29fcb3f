//! IMU sample type

use crate::Millis;
use serde::{Deserialize, Serialize};

/// One accelerometer + gyroscope reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ImuSample {
    /// Capture time (monotonic ms)
    pub timestamp_ms: Millis,
    /// Acceleration in X (g)
    pub accel_x: f32,
    /// Acceleration in Y (g)
    pub accel_y: f32,
    /// Acceleration in Z (g)
    pub accel_z: f32,
    /// Angular velocity X (deg/s)
    pub gyro_x: f32,
    /// Angular velocity Y (deg/s)
    pub gyro_y: f32,
    /// Angular velocity Z (deg/s)
    pub gyro_z: f32,
}

impl ImuSample {
    /// Create a sample from axis arrays
    pub fn new(timestamp_ms: Millis, accel: [f32; 3], gyro: [f32; 3]) -> Self {
        Self {
            timestamp_ms,
            accel_x: accel[0],
            accel_y: accel[1],
            accel_z: accel[2],
            gyro_x: gyro[0],
            gyro_y: gyro[1],
            gyro_z: gyro[2],
        }
    }

    /// Acceleration as `[x, y, z]`
    pub fn accel(&self) -> [f32; 3] {
        [self.accel_x, self.accel_y, self.accel_z]
    }

    /// Angular velocity as `[x, y, z]`
    pub fn gyro(&self) -> [f32; 3] {
        [self.gyro_x, self.gyro_y, self.gyro_z]
    }

    /// Total G-force magnitude
    pub fn accel_magnitude(&self) -> f32 {
        (self.accel_x * self.accel_x + self.accel_y * self.accel_y + self.accel_z * self.accel_z)
            .sqrt()
    }

    /// Total rotation rate magnitude (deg/s)
    pub fn gyro_magnitude(&self) -> f32 {
        (self.gyro_x * self.gyro_x + self.gyro_y * self.gyro_y + self.gyro_z * self.gyro_z).sqrt()
    }

    /// True when every axis holds a finite value
    pub fn is_finite(&self) -> bool {
        self.accel().iter().chain(self.gyro().iter()).all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magnitude() {
        let sample = ImuSample::new(0, [3.0, 4.0, 0.0], [0.0, 0.0, 0.0]);
        assert!((sample.accel_magnitude() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_non_finite_detected() {
        let sample = ImuSample::new(0, [f32::NAN, 0.0, 1.0], [0.0; 3]);
        assert!(!sample.is_finite());
        assert!(ImuSample::new(0, [0.0, 0.0, 1.0], [1.0; 3]).is_finite());
    }
}
