//! Window Feature Computation

use helmet_protocol::{elapsed_ms, ImuSample};
use serde::{Deserialize, Serialize};

/// Shape of the acceleration magnitude over a window (g)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MagnitudeStats {
    pub mean: f64,
    pub std_dev: f64,
    /// Positive for windows dominated by short spikes
    pub skewness: f64,
    /// Excess kurtosis; large for a single impact in a calm window
    pub kurtosis: f64,
    pub min: f64,
    pub max: f64,
}

/// Raw power sums, folded into central moments once the window is read
#[derive(Debug, Default)]
struct PowerSums {
    n: f64,
    s1: f64,
    s2: f64,
    s3: f64,
    s4: f64,
    min: f64,
    max: f64,
}

impl PowerSums {
    fn add(&mut self, x: f64) {
        if self.n == 0.0 {
            self.min = x;
            self.max = x;
        } else {
            self.min = self.min.min(x);
            self.max = self.max.max(x);
        }
        self.n += 1.0;
        self.s1 += x;
        self.s2 += x * x;
        self.s3 += x * x * x;
        self.s4 += x * x * x * x;
    }

    fn finish(&self) -> MagnitudeStats {
        if self.n == 0.0 {
            return MagnitudeStats::default();
        }
        let n = self.n;
        let mean = self.s1 / n;
        let (e2, e3, e4) = (self.s2 / n, self.s3 / n, self.s4 / n);
        let m2 = (e2 - mean * mean).max(0.0);
        let m3 = e3 - 3.0 * mean * e2 + 2.0 * mean.powi(3);
        let m4 = e4 - 4.0 * mean * e3 + 6.0 * mean * mean * e2 - 3.0 * mean.powi(4);
        let std_dev = m2.sqrt();

        // Flat windows carry no shape; rounding noise would otherwise show up here
        let (skewness, kurtosis) = if std_dev > 1e-9 {
            (m3 / std_dev.powi(3), m4 / (m2 * m2) - 3.0)
        } else {
            (0.0, 0.0)
        };

        MagnitudeStats {
            mean,
            std_dev,
            skewness,
            kurtosis,
            min: self.min,
            max: self.max,
        }
    }
}

/// Labeling features for one event window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowFeatures {
    pub sample_count: usize,
    /// First to last sample (ms)
    pub duration_ms: u32,
    pub accel_magnitude: MagnitudeStats,
    /// Largest angular velocity magnitude (deg/s)
    pub gyro_magnitude_max: f64,
    /// Mean jerk between consecutive samples (g/s)
    pub jerk_mean: f64,
    /// Largest jerk between consecutive samples (g/s)
    pub jerk_max: f64,
}

impl WindowFeatures {
    /// Compute features over chronologically ordered samples in one pass
    pub fn from_samples(samples: &[ImuSample]) -> Self {
        let mut magnitude = PowerSums::default();
        let mut gyro_magnitude_max = 0.0f64;
        let (mut jerk_sum, mut jerk_max, mut jerk_count) = (0.0f64, 0.0f64, 0usize);
        let mut previous: Option<(u32, f64)> = None;

        for sample in samples {
            let g = sample.accel_magnitude() as f64;
            magnitude.add(g);
            gyro_magnitude_max = gyro_magnitude_max.max(sample.gyro_magnitude() as f64);

            // Same jerk definition as the device: Δt clamped to 1 ms
            if let Some((ts, prev_g)) = previous {
                let dt_s = elapsed_ms(sample.timestamp_ms, ts).max(1) as f64 / 1000.0;
                let jerk = (g - prev_g).abs() / dt_s;
                jerk_sum += jerk;
                jerk_max = jerk_max.max(jerk);
                jerk_count += 1;
            }
            previous = Some((sample.timestamp_ms, g));
        }

        let duration_ms = match (samples.first(), samples.last()) {
            (Some(first), Some(last)) => elapsed_ms(last.timestamp_ms, first.timestamp_ms),
            _ => 0,
        };

        Self {
            sample_count: samples.len(),
            duration_ms,
            accel_magnitude: magnitude.finish(),
            gyro_magnitude_max,
            jerk_mean: if jerk_count == 0 {
                0.0
            } else {
                jerk_sum / jerk_count as f64
            },
            jerk_max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upright(ts: u32, g: f32) -> ImuSample {
        ImuSample::new(ts, [0.0, 0.0, g], [0.0; 3])
    }

    fn stats_of(values: &[f32]) -> MagnitudeStats {
        let samples: Vec<ImuSample> = values
            .iter()
            .enumerate()
            .map(|(i, g)| upright(i as u32 * 10, *g))
            .collect();
        WindowFeatures::from_samples(&samples).accel_magnitude
    }

    #[test]
    fn test_mean_and_spread() {
        let stats = stats_of(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((stats.mean - 5.0).abs() < 1e-9);
        assert!((stats.std_dev - 2.0).abs() < 1e-9);
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 9.0);
    }

    #[test]
    fn test_impact_is_skewed_and_heavy_tailed() {
        let mut values = vec![1.0; 19];
        values.push(6.0);
        let stats = stats_of(&values);
        assert!(stats.skewness > 3.0);
        assert!(stats.kurtosis > 10.0);
    }

    #[test]
    fn test_flat_window_has_no_shape() {
        let stats = stats_of(&[1.0; 12]);
        assert_eq!(stats.std_dev, 0.0);
        assert_eq!(stats.skewness, 0.0);
        assert_eq!(stats.kurtosis, 0.0);
    }

    #[test]
    fn test_empty_window() {
        assert_eq!(WindowFeatures::from_samples(&[]), WindowFeatures::default());
    }

    #[test]
    fn test_window_features() {
        let samples = vec![
            upright(0, 1.0),
            ImuSample::new(10, [0.0, 0.0, 3.0], [0.0, 0.0, 90.0]),
            upright(20, 1.0),
        ];
        let features = WindowFeatures::from_samples(&samples);
        assert_eq!(features.sample_count, 3);
        assert_eq!(features.duration_ms, 20);
        assert!((features.jerk_max - 200.0).abs() < 1e-6);
        assert!((features.jerk_mean - 200.0).abs() < 1e-6);
        assert!((features.gyro_magnitude_max - 90.0).abs() < 1e-6);
        assert_eq!(features.accel_magnitude.max, 3.0);
    }
}
