//! Protocol Error Types

use crate::frame::Channel;
use thiserror::Error;

/// Errors that can occur while decoding link frames
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Frame length does not match the channel's fixed layout
    #[error("Malformed {channel:?} frame: expected {expected} bytes, got {actual}")]
    MalformedFrame {
        channel: Channel,
        expected: usize,
        actual: usize,
    },

    /// Command byte outside the opcode table
    #[error("Unknown command opcode 0x{0:02X}")]
    UnknownOpcode(u8),

    /// State byte outside the helmet state table
    #[error("Unknown helmet state 0x{0:02X}")]
    UnknownState(u8),

    /// Event kind byte outside the classifier table
    #[error("Unknown event kind 0x{0:02X}")]
    UnknownEventKind(u8),

    /// Crash-alert frame carrying a state other than CrashAlert
    #[error("Crash alert frame carries state 0x{0:02X}")]
    UnexpectedState(u8),
}

/// Errors reported by a transport when handing it a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Outbound queue is full; try again later
    #[error("Transport backpressured")]
    Backpressure,

    /// Peer is not connected
    #[error("Transport disconnected")]
    Disconnected,
}
