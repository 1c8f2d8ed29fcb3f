//! Helmet Link Protocol
//!
//! Fixed-width little-endian frames exchanged between the helmet and the
//! companion app, one frame format per logical channel, plus the model
//! enums both sides share.

mod error;
mod frame;
mod model;
mod transport;

pub use error::{ProtocolError, TransportError};
pub use frame::{Channel, CrashAlertFrame, Frame, SensorFrame};
pub use model::{Command, DetectedEvent, EventKind, HelmetState};
pub use transport::{MemoryTransport, Transport};

pub use sample_buffer::{elapsed_ms, ImuSample, Millis};

/// Frame sizes in bytes
pub mod frame_len {
    /// `timestamp:u32 | accel:3×f32 | gyro:3×f32 | state:u8`
    pub const SENSOR: usize = 29;
    /// `opcode:u8`
    pub const COMMAND: usize = 1;
    /// `timestamp:u32 | peak:f32 | state:u8`
    pub const CRASH_ALERT: usize = 9;
    /// `timestamp:u32 | kind:u8 | confidence:f32 | peak_accel:f32 | peak_jerk:f32`
    pub const EVENT: usize = 17;
}
