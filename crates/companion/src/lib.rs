//! Companion Event Service
//!
//! Receives helmet frames, keeps a shadow copy of the helmet state, and
//! captures windows of samples around detected events for labeling.
//! Observers consume a bounded update stream and a `watch` of the shadow.

mod config;
mod error;
mod features;
mod service;
mod shadow;
mod window;

pub use config::CompanionConfig;
pub use error::CompanionError;
pub use features::{MagnitudeStats, WindowFeatures};
pub use service::{CompanionEventService, CompanionStats, CompanionUpdate, Inbound};
pub use shadow::ShadowState;
pub use window::EventWindow;
