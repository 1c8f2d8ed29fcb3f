//! IMU Sample Buffer
//!
//! Provides the fixed-capacity sample ring used for smoothing on the device
//! and for event-window history on the companion.

mod buffer;
mod peak;
mod sample;

pub use buffer::{SampleBuffer, DEFAULT_CAPACITY};
pub use sample::ImuSample;

/// Monotonic millisecond timestamp, the width the firmware clock and the wire use.
///
/// Elapsed time must be computed with [`elapsed_ms`] so counter roll-over is harmless.
pub type Millis = u32;

/// Milliseconds elapsed from `since` to `now`, tolerant of counter wrap.
#[inline]
pub fn elapsed_ms(now: Millis, since: Millis) -> Millis {
    now.wrapping_sub(since)
}
