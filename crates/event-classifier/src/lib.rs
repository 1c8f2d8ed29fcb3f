//! Rider Event Classifier
//!
//! Turns each IMU sample into exactly one [`DetectedEvent`] using ordered
//! threshold rules over the smoothed statistics of a [`SampleBuffer`].

mod classifier;
mod config;
mod error;
mod validator;

pub use classifier::EventClassifier;
pub use config::ClassifierConfig;
pub use error::ClassifierError;
pub use validator::{SampleValidator, ValidationConfig};

pub use helmet_protocol::{DetectedEvent, EventKind};
pub use sample_buffer::{ImuSample, SampleBuffer};
