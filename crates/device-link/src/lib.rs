//! Device Link
//!
//! Runs the helmet side of the system:
//! - [`HelmetDevice`] ticks the classify → state → notify → LED pipeline
//! - [`DeviceLinkAdapter`] turns notifications into frames with rate
//!   limiting and crash-alert retries, and queues inbound commands
//! - [`DeviceConfig`] loads every tunable from defaults, file and environment

mod adapter;
mod alerting;
mod config;
mod device;
mod error;
mod imu;

pub use adapter::{DeviceLinkAdapter, LinkStats};
pub use alerting::{LocalAlerting, LogAlerting};
pub use config::{DeviceConfig, LinkConfig};
pub use device::{HelmetDevice, TickReport};
pub use error::{ConfigError, ImuError, LinkError};
pub use imu::{ImuSource, ScriptedImu};

pub use event_classifier::ClassifierConfig;
pub use helmet_state::{LedConfig, Rgb, StateMachineConfig};
