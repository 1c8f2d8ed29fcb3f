//! Companion error types

use helmet_protocol::{ProtocolError, TransportError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompanionError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CompanionError {
    fn from(e: serde_json::Error) -> Self {
        CompanionError::Serialization(e.to_string())
    }
}

impl From<postcard::Error> for CompanionError {
    fn from(e: postcard::Error) -> Self {
        CompanionError::Serialization(e.to_string())
    }
}
