//! Frame Encoding and Decoding
//!
//! Every channel has exactly one fixed layout. Decoders check the length
//! first and reject anything else as malformed rather than guessing where
//! fields start.

use crate::error::ProtocolError;
use crate::frame_len;
use crate::model::{Command, DetectedEvent, EventKind, HelmetState};
use crate::{ImuSample, Millis};
use serde::{Deserialize, Serialize};

/// Logical channels. Channel identity is provided by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// Periodic telemetry, best-effort (device → app)
    Sensor,
    /// App commands (app → device)
    Command,
    /// Crash alert, retried until delivered (device → app)
    CrashAlert,
    /// Classified event report, best-effort (device → app)
    Event,
}

impl Channel {
    /// Fixed frame length on this channel
    pub fn frame_len(&self) -> usize {
        match self {
            Channel::Sensor => frame_len::SENSOR,
            Channel::Command => frame_len::COMMAND,
            Channel::CrashAlert => frame_len::CRASH_ALERT,
            Channel::Event => frame_len::EVENT,
        }
    }

    fn check_len(&self, bytes: &[u8]) -> Result<(), ProtocolError> {
        let expected = self.frame_len();
        if bytes.len() != expected {
            return Err(ProtocolError::MalformedFrame {
                channel: *self,
                expected,
                actual: bytes.len(),
            });
        }
        Ok(())
    }
}

/// Telemetry notification: latest sample plus current state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorFrame {
    pub sample: ImuSample,
    pub state: HelmetState,
}

impl SensorFrame {
    pub fn encode(&self) -> [u8; frame_len::SENSOR] {
        let mut buf = [0u8; frame_len::SENSOR];
        let s = &self.sample;
        buf[0..4].copy_from_slice(&s.timestamp_ms.to_le_bytes());
        let axes = [s.accel_x, s.accel_y, s.accel_z, s.gyro_x, s.gyro_y, s.gyro_z];
        for (i, v) in axes.iter().enumerate() {
            let off = 4 + i * 4;
            buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
        }
        buf[28] = self.state.as_byte();
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Channel::Sensor.check_len(bytes)?;
        let sample = ImuSample {
            timestamp_ms: read_u32(bytes, 0),
            accel_x: read_f32(bytes, 4),
            accel_y: read_f32(bytes, 8),
            accel_z: read_f32(bytes, 12),
            gyro_x: read_f32(bytes, 16),
            gyro_y: read_f32(bytes, 20),
            gyro_z: read_f32(bytes, 24),
        };
        let state = HelmetState::try_from(bytes[28])?;
        Ok(Self { sample, state })
    }
}

/// Crash alert notification
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrashAlertFrame {
    pub timestamp_ms: Millis,
    /// Peak acceleration magnitude of the impact (g)
    pub peak_accel: f32,
}

impl CrashAlertFrame {
    pub fn encode(&self) -> [u8; frame_len::CRASH_ALERT] {
        let mut buf = [0u8; frame_len::CRASH_ALERT];
        buf[0..4].copy_from_slice(&self.timestamp_ms.to_le_bytes());
        buf[4..8].copy_from_slice(&self.peak_accel.to_le_bytes());
        buf[8] = HelmetState::CrashAlert.as_byte();
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Channel::CrashAlert.check_len(bytes)?;
        let state = HelmetState::try_from(bytes[8])?;
        if state != HelmetState::CrashAlert {
            return Err(ProtocolError::UnexpectedState(bytes[8]));
        }
        Ok(Self {
            timestamp_ms: read_u32(bytes, 0),
            peak_accel: read_f32(bytes, 4),
        })
    }
}

fn encode_event(event: &DetectedEvent) -> [u8; frame_len::EVENT] {
    let mut buf = [0u8; frame_len::EVENT];
    buf[0..4].copy_from_slice(&event.timestamp_ms.to_le_bytes());
    buf[4] = event.kind.as_byte();
    buf[5..9].copy_from_slice(&event.confidence.to_le_bytes());
    buf[9..13].copy_from_slice(&event.peak_accel.to_le_bytes());
    buf[13..17].copy_from_slice(&event.peak_jerk.to_le_bytes());
    buf
}

fn decode_event(bytes: &[u8]) -> Result<DetectedEvent, ProtocolError> {
    Channel::Event.check_len(bytes)?;
    Ok(DetectedEvent {
        timestamp_ms: read_u32(bytes, 0),
        kind: EventKind::try_from(bytes[4])?,
        confidence: read_f32(bytes, 5),
        peak_accel: read_f32(bytes, 9),
        peak_jerk: read_f32(bytes, 13),
    })
}

fn decode_command(bytes: &[u8]) -> Result<Command, ProtocolError> {
    Channel::Command.check_len(bytes)?;
    Command::try_from(bytes[0])
}

/// Any decoded frame, tagged by the channel it travels on
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Frame {
    Sensor(SensorFrame),
    Command(Command),
    CrashAlert(CrashAlertFrame),
    Event(DetectedEvent),
}

impl Frame {
    /// Channel this frame belongs on
    pub fn channel(&self) -> Channel {
        match self {
            Frame::Sensor(_) => Channel::Sensor,
            Frame::Command(_) => Channel::Command,
            Frame::CrashAlert(_) => Channel::CrashAlert,
            Frame::Event(_) => Channel::Event,
        }
    }

    /// Encode the payload for the frame's channel
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Frame::Sensor(f) => f.encode().to_vec(),
            Frame::Command(c) => vec![c.opcode()],
            Frame::CrashAlert(f) => f.encode().to_vec(),
            Frame::Event(e) => encode_event(e).to_vec(),
        }
    }

    /// Decode a payload received on `channel`
    pub fn decode(channel: Channel, bytes: &[u8]) -> Result<Self, ProtocolError> {
        match channel {
            Channel::Sensor => SensorFrame::decode(bytes).map(Frame::Sensor),
            Channel::Command => decode_command(bytes).map(Frame::Command),
            Channel::CrashAlert => CrashAlertFrame::decode(bytes).map(Frame::CrashAlert),
            Channel::Event => decode_event(bytes).map(Frame::Event),
        }
    }
}

fn read_u32(bytes: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([bytes[off], bytes[off + 1], bytes[off + 2], bytes[off + 3]])
}

fn read_f32(bytes: &[u8], off: usize) -> f32 {
    f32::from_bits(read_u32(bytes, off))
}
