//! Event Classifier
//!
//! Rule-based classification of one IMU sample per tick against the
//! smoothed window:
//! - Crash (instantaneous magnitude)
//! - Brake (smoothed forward deceleration held for a dwell window)
//! - Bump (short spike above the smoothed magnitude)
//! - Turn (smoothed yaw rate held for a dwell window)

use tracing::{debug, warn};

use crate::config::ClassifierConfig;
use crate::error::ClassifierError;
use crate::validator::SampleValidator;
use helmet_protocol::{DetectedEvent, EventKind};
use sample_buffer::{elapsed_ms, ImuSample, Millis, SampleBuffer};

/// Confidence reported for a plain Normal tick
const NORMAL_CONFIDENCE: f32 = 0.8;

/// Stateful classifier. Owns the smoothing buffer.
pub struct EventClassifier {
    config: ClassifierConfig,
    buffer: SampleBuffer,
    validator: SampleValidator,
    /// First tick of the current deceleration candidate
    brake_since: Option<Millis>,
    /// First tick of the current rotation candidate
    turn_since: Option<Millis>,
    /// Last reported bump, for the refractory window
    last_bump: Option<Millis>,
    last_timestamp: Option<Millis>,
    stale_count: u64,
}

impl EventClassifier {
    /// Create new classifier
    pub fn new(config: ClassifierConfig) -> Self {
        let buffer = SampleBuffer::new(config.window_size);
        let validator = SampleValidator::new(config.validation.clone());
        Self {
            config,
            buffer,
            validator,
            brake_since: None,
            turn_since: None,
            last_bump: None,
            last_timestamp: None,
            stale_count: 0,
        }
    }

    /// Classify one sample.
    ///
    /// Rejected samples leave the buffer and every dwell tracker untouched.
    pub fn classify(&mut self, sample: ImuSample) -> Result<DetectedEvent, ClassifierError> {
        if let Err(e) = self.validator.validate(&sample, self.last_timestamp) {
            self.stale_count += 1;
            warn!("Skipping sample at {} ms: {}", sample.timestamp_ms, e);
            return Err(e);
        }

        self.buffer.push(sample);
        self.last_timestamp = Some(sample.timestamp_ms);

        let event = self.evaluate(&sample);
        if event.kind.is_reportable() {
            debug!(
                "Classified {:?} at {} ms (confidence {:.2}, peak {:.2} g)",
                event.kind, event.timestamp_ms, event.confidence, event.peak_accel
            );
        }
        Ok(event)
    }

    fn evaluate(&mut self, sample: &ImuSample) -> DetectedEvent {
        let cfg = &self.config;
        let now = sample.timestamp_ms;
        let magnitude = sample.accel_magnitude();
        let smoothed = self.buffer.moving_average_magnitude();
        let warming_up = !self.buffer.is_full();

        // Check for crash (highest priority)
        if magnitude >= cfg.crash_g {
            let confidence = margin_confidence(magnitude, cfg.crash_g);
            return self.event(EventKind::Crash, confidence, now);
        }

        // Check for braking
        let deceleration = -self.buffer.mean_accel()[0];
        let brake_candidate = deceleration >= cfg.brake_g && smoothed < cfg.crash_g;
        if brake_candidate {
            let since = *self.brake_since.get_or_insert(now);
            if warming_up {
                return self.event(EventKind::Unknown, 0.0, now);
            }
            if elapsed_ms(now, since) >= cfg.brake_dwell_ms {
                let confidence = margin_confidence(deceleration, cfg.brake_g);
                return self.event(EventKind::Brake, confidence, now);
            }
        } else {
            self.brake_since = None;
        }

        // Check for bump
        let spike = magnitude - smoothed;
        let jerk = self.buffer.latest_jerk();
        let refractory = self
            .last_bump
            .map(|at| elapsed_ms(now, at) < cfg.bump_window_ms)
            .unwrap_or(false);
        if !brake_candidate
            && !refractory
            && spike >= cfg.bump_delta_g
            && jerk >= cfg.bump_jerk_g_per_s
        {
            self.last_bump = Some(now);
            let confidence = margin_confidence(spike, cfg.bump_delta_g);
            return self.event(EventKind::Bump, confidence, now);
        }

        // Check for turning
        let yaw_rate = self.buffer.mean_gyro()[2].abs();
        if yaw_rate >= cfg.turn_deg_per_sec {
            let since = *self.turn_since.get_or_insert(now);
            if warming_up {
                return self.event(EventKind::Unknown, 0.0, now);
            }
            if elapsed_ms(now, since) >= cfg.turn_dwell_ms {
                let confidence = margin_confidence(yaw_rate, cfg.turn_deg_per_sec);
                return self.event(EventKind::Turn, confidence, now);
            }
        } else {
            self.turn_since = None;
        }

        self.event(EventKind::Normal, NORMAL_CONFIDENCE, now)
    }

    fn event(&self, kind: EventKind, confidence: f32, timestamp_ms: Millis) -> DetectedEvent {
        DetectedEvent {
            kind,
            confidence,
            peak_accel: self.buffer.peak_magnitude(),
            peak_jerk: self.buffer.peak_jerk(),
            timestamp_ms,
        }
    }

    /// Smoothing buffer (read-only)
    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    /// Active configuration
    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Samples rejected by validation since construction
    pub fn stale_count(&self) -> u64 {
        self.stale_count
    }

    /// Drop smoothing history and dwell trackers
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.brake_since = None;
        self.turn_since = None;
        self.last_bump = None;
        self.last_timestamp = None;
    }
}

impl Default for EventClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

/// 0.2 at the threshold, rising linearly to 1.0 at twice the threshold
fn margin_confidence(value: f32, threshold: f32) -> f32 {
    if threshold <= 0.0 {
        return 1.0;
    }
    0.2 + 0.8 * ((value - threshold) / threshold).clamp(0.0, 1.0)
}
