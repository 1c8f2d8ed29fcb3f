//! Helmet Simulator - Main Entry Point
//!
//! Usage: `helmet-sim [config-file]`

use std::path::PathBuf;

use anyhow::Context;
use companion::CompanionConfig;
use device_link::DeviceConfig;
use helmet_sim::{default_ride, default_rider, init_logging, run_ride};
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_logging()?;

    info!("=== Helmet Simulator v{} ===", env!("CARGO_PKG_VERSION"));

    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = DeviceConfig::load(path.as_deref()).context("loading device configuration")?;

    let summary = run_ride(
        &config,
        CompanionConfig::default(),
        default_ride(),
        default_rider(),
    )
    .await?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
