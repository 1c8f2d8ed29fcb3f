//! Helmet Simulator
//!
//! Runs a simulated helmet and a companion service in one process,
//! connected by tokio channels standing in for the radio link.

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod ride;
mod transport;

pub use ride::{default_ride, default_rider, run_ride, RideSummary, RiderAction, UpdateTally};
pub use transport::ChannelTransport;

/// Initialize logging
pub fn init_logging() -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
}
