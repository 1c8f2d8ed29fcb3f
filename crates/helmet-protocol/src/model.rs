//! Shared Model Definitions
//!
//! Helmet states, app commands and classified events, with the byte codes
//! the firmware puts on the wire.

use crate::error::ProtocolError;
use crate::Millis;
use serde::{Deserialize, Serialize};

/// Display state of the helmet. The device owns the authoritative value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum HelmetState {
    /// Running light
    #[default]
    Normal = 0,
    /// Brake light active
    Braking = 1,
    /// Left turn signal
    TurnLeft = 2,
    /// Right turn signal
    TurnRight = 3,
    /// Crash detected, waiting for confirmation
    CrashAlert = 4,
    /// Party mode (rainbow)
    Party = 5,
}

impl HelmetState {
    /// Wire byte
    pub fn as_byte(&self) -> u8 {
        *self as u8
    }
}

impl TryFrom<u8> for HelmetState {
    type Error = ProtocolError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0 => Ok(HelmetState::Normal),
            1 => Ok(HelmetState::Braking),
            2 => Ok(HelmetState::TurnLeft),
            3 => Ok(HelmetState::TurnRight),
            4 => Ok(HelmetState::CrashAlert),
            5 => Ok(HelmetState::Party),
            other => Err(ProtocolError::UnknownState(other)),
        }
    }
}

/// Commands written by the companion app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Command {
    /// Start left turn signal (0x01)
    TurnLeftOn = 0x01,
    /// Stop left turn signal (0x02)
    TurnLeftOff = 0x02,
    /// Start right turn signal (0x03)
    TurnRightOn = 0x03,
    /// Stop right turn signal (0x04)
    TurnRightOff = 0x04,
    /// Rider responded: not a real crash (0x05)
    CrashFalseAlarm = 0x05,
    /// Enter party mode (0x06)
    PartyModeOn = 0x06,
    /// Back to normal running light (0x07)
    NormalMode = 0x07,
}

impl Command {
    /// Get the opcode value
    pub fn opcode(&self) -> u8 {
        *self as u8
    }

    /// All commands in opcode order
    pub const ALL: [Command; 7] = [
        Command::TurnLeftOn,
        Command::TurnLeftOff,
        Command::TurnRightOn,
        Command::TurnRightOff,
        Command::CrashFalseAlarm,
        Command::PartyModeOn,
        Command::NormalMode,
    ];
}

impl TryFrom<u8> for Command {
    type Error = ProtocolError;

    fn try_from(opcode: u8) -> Result<Self, Self::Error> {
        Command::ALL
            .iter()
            .copied()
            .find(|c| c.opcode() == opcode)
            .ok_or(ProtocolError::UnknownOpcode(opcode))
    }
}

/// Classified rider event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventKind {
    Brake = 0,
    Bump = 1,
    Crash = 2,
    Normal = 3,
    Turn = 4,
    /// Not enough data yet (buffer warm-up)
    Unknown = 0xFF,
}

impl EventKind {
    /// Wire byte
    pub fn as_byte(&self) -> u8 {
        *self as u8
    }

    /// Whether the event is worth reporting upstream
    pub fn is_reportable(&self) -> bool {
        !matches!(self, EventKind::Normal | EventKind::Unknown)
    }
}

impl TryFrom<u8> for EventKind {
    type Error = ProtocolError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0 => Ok(EventKind::Brake),
            1 => Ok(EventKind::Bump),
            2 => Ok(EventKind::Crash),
            3 => Ok(EventKind::Normal),
            4 => Ok(EventKind::Turn),
            0xFF => Ok(EventKind::Unknown),
            other => Err(ProtocolError::UnknownEventKind(other)),
        }
    }
}

/// One classification result, produced once per sampling tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectedEvent {
    pub kind: EventKind,
    /// 0.0 - 1.0, derived from the margin over the rule threshold
    pub confidence: f32,
    /// Peak acceleration magnitude in the smoothing window (g)
    pub peak_accel: f32,
    /// Peak jerk in the smoothing window (g/s)
    pub peak_jerk: f32,
    /// Timestamp of the sample that produced the event
    pub timestamp_ms: Millis,
}

impl DetectedEvent {
    /// Event of the given kind with zeroed metrics
    pub fn new(kind: EventKind, timestamp_ms: Millis) -> Self {
        Self {
            kind,
            confidence: 0.0,
            peak_accel: 0.0,
            peak_jerk: 0.0,
            timestamp_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcodes_match_firmware_table() {
        assert_eq!(Command::TurnLeftOn.opcode(), 0x01);
        assert_eq!(Command::CrashFalseAlarm.opcode(), 0x05);
        assert_eq!(Command::NormalMode.opcode(), 0x07);
    }

    #[test]
    fn test_unknown_opcode_rejected() {
        assert_eq!(Command::try_from(0x00), Err(ProtocolError::UnknownOpcode(0x00)));
        assert_eq!(Command::try_from(0x08), Err(ProtocolError::UnknownOpcode(0x08)));
    }

    #[test]
    fn test_state_bytes() {
        for byte in 0..=5u8 {
            let state = HelmetState::try_from(byte).unwrap();
            assert_eq!(state.as_byte(), byte);
        }
        assert!(HelmetState::try_from(6).is_err());
    }

    #[test]
    fn test_reportable_kinds() {
        assert!(EventKind::Crash.is_reportable());
        assert!(EventKind::Bump.is_reportable());
        assert!(!EventKind::Normal.is_reportable());
        assert!(!EventKind::Unknown.is_reportable());
    }
}
