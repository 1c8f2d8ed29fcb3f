//! LED strip animation
//!
//! Every pattern is a pure function of state and time, so a frame can be
//! rendered at any tick without animation state carried between calls.

use helmet_protocol::{HelmetState, Millis};
use serde::{Deserialize, Serialize};

/// One LED colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const OFF: Rgb = Rgb::new(0, 0, 0);
    pub const RED: Rgb = Rgb::new(255, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const AMBER: Rgb = Rgb::new(255, 165, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Scale every channel by `brightness / 255`
    pub fn scaled(self, brightness: u8) -> Self {
        let scale = |c: u8| ((c as u16 * brightness as u16) / 255) as u8;
        Self::new(scale(self.r), scale(self.g), scale(self.b))
    }

    /// Colour from 8-bit hue, saturation and value
    pub fn from_hsv(hue: u8, sat: u8, val: u8) -> Self {
        if sat == 0 {
            return Self::new(val, val, val);
        }
        let region = hue / 43;
        let remainder = (hue - region * 43) as u16 * 6;
        let (v, s) = (val as u16, sat as u16);
        let p = ((v * (255 - s)) >> 8) as u8;
        let q = ((v * (255 - ((s * remainder) >> 8))) >> 8) as u8;
        let t = ((v * (255 - ((s * (255 - remainder)) >> 8))) >> 8) as u8;
        match region {
            0 => Self::new(val, t, p),
            1 => Self::new(q, val, p),
            2 => Self::new(p, val, t),
            3 => Self::new(p, q, val),
            4 => Self::new(t, p, val),
            _ => Self::new(val, p, q),
        }
    }
}

/// Strip layout and animation timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedConfig {
    pub led_count: usize,
    /// Global brightness (0-255)
    pub brightness: u8,
    /// Running light breathing step (ms)
    pub breathe_step_ms: u32,
    /// Brake light bright/dim toggle (ms)
    pub brake_flash_ms: u32,
    /// Turn signal sweep step (ms)
    pub turn_step_ms: u32,
    /// Pause between turn sweeps (ms)
    pub turn_pause_ms: u32,
    /// Crash strobe toggle (ms)
    pub crash_strobe_ms: u32,
    /// Rainbow hue step (ms)
    pub party_step_ms: u32,
    /// Fault overlay blink (ms)
    pub fault_blink_ms: u32,
}

impl Default for LedConfig {
    fn default() -> Self {
        Self {
            led_count: 12,
            brightness: 150,
            breathe_step_ms: 30,
            brake_flash_ms: 100,
            turn_step_ms: 100,
            turn_pause_ms: 200,
            crash_strobe_ms: 50,
            party_step_ms: 20,
            fault_blink_ms: 500,
        }
    }
}

/// Breathing level bounds for the running light
const BREATHE_MIN: u32 = 30;
const BREATHE_MAX: u32 = 100;
const BREATHE_STEP: u32 = 2;

/// Maps helmet state to strip frames
pub struct LedAnimator {
    config: LedConfig,
}

impl LedAnimator {
    pub fn new(config: LedConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LedConfig {
        &self.config
    }

    /// Render the strip for `state` at `now`.
    ///
    /// `fault` replaces the state pattern with a slow red blink.
    pub fn render(&self, state: HelmetState, now: Millis, fault: bool) -> Vec<Rgb> {
        let frame = if fault {
            self.fault(now)
        } else {
            match state {
                HelmetState::Normal => self.breathe(now),
                HelmetState::Braking => self.brake(now),
                HelmetState::TurnLeft => self.sweep(now, false),
                HelmetState::TurnRight => self.sweep(now, true),
                HelmetState::CrashAlert => self.strobe(now),
                HelmetState::Party => self.rainbow(now),
            }
        };
        let brightness = self.config.brightness;
        frame.into_iter().map(|c| c.scaled(brightness)).collect()
    }

    fn step(now: Millis, period_ms: u32) -> u32 {
        now / period_ms.max(1)
    }

    fn breathe(&self, now: Millis) -> Vec<Rgb> {
        let n = self.config.led_count;
        let half_cycle = (BREATHE_MAX - BREATHE_MIN) / BREATHE_STEP;
        let phase = Self::step(now, self.config.breathe_step_ms) % (2 * half_cycle);
        let level = if phase < half_cycle {
            BREATHE_MIN + phase * BREATHE_STEP
        } else {
            BREATHE_MAX - (phase - half_cycle) * BREATHE_STEP
        };

        // Soft glow on the four centre LEDs
        let centre = n / 2;
        let lit = centre.saturating_sub(2)..(centre + 2).min(n);
        (0..n)
            .map(|i| {
                if lit.contains(&i) {
                    Rgb::new(level as u8, 0, 0)
                } else {
                    Rgb::OFF
                }
            })
            .collect()
    }

    fn brake(&self, now: Millis) -> Vec<Rgb> {
        let on = Self::step(now, self.config.brake_flash_ms) % 2 == 0;
        let colour = if on { Rgb::RED } else { Rgb::new(100, 0, 0) };
        vec![colour; self.config.led_count]
    }

    /// Amber sweep from the centre outwards, then a short pause
    fn sweep(&self, now: Millis, right: bool) -> Vec<Rgb> {
        let n = self.config.led_count;
        let mut frame = vec![Rgb::OFF; n];
        let half = n / 2;
        if half == 0 {
            return frame;
        }

        let steps = 2 * half as u32;
        let pause = self.config.turn_pause_ms / self.config.turn_step_ms.max(1);
        let step = Self::step(now, self.config.turn_step_ms) % (steps + pause);
        if step >= steps {
            return frame;
        }

        let reach = (step as usize) % half;
        if right {
            for led in frame.iter_mut().skip(half).take(reach + 1) {
                *led = Rgb::AMBER;
            }
        } else {
            for led in frame[half - 1 - reach..half].iter_mut() {
                *led = Rgb::AMBER;
            }
        }
        frame
    }

    fn strobe(&self, now: Millis) -> Vec<Rgb> {
        let red = Self::step(now, self.config.crash_strobe_ms) % 2 == 0;
        let colour = if red { Rgb::RED } else { Rgb::WHITE };
        vec![colour; self.config.led_count]
    }

    fn rainbow(&self, now: Millis) -> Vec<Rgb> {
        let n = self.config.led_count.max(1);
        let offset = Self::step(now, self.config.party_step_ms) as usize;
        (0..self.config.led_count)
            .map(|i| {
                let hue = ((i * 256 / n + offset) & 255) as u8;
                Rgb::from_hsv(hue, 255, 200)
            })
            .collect()
    }

    fn fault(&self, now: Millis) -> Vec<Rgb> {
        let on = Self::step(now, self.config.fault_blink_ms) % 2 == 0;
        let colour = if on { Rgb::RED } else { Rgb::OFF };
        vec![colour; self.config.led_count]
    }
}

impl Default for LedAnimator {
    fn default() -> Self {
        Self::new(LedConfig::default())
    }
}
