//! Device Error Types

use helmet_protocol::{Millis, ProtocolError};
use thiserror::Error;

/// Link layer errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinkError {
    /// Crash alert could not be handed to the transport
    #[error("Crash alert from {timestamp_ms}ms not delivered after {attempts} attempts")]
    DeliveryFailed { timestamp_ms: Millis, attempts: u8 },

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// IMU error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImuError {
    #[error("IMU read failed: {0}")]
    Read(String),

    #[error("IMU not initialized")]
    NotInitialized,
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
