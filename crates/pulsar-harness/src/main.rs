use anyhow::{Context, Result};

use pulsar_engine::core::HarnessConfig;
use pulsar_engine::device::GpuInit;
use pulsar_engine::logging::{init_logging, LoggingConfig};
use pulsar_engine::window::{Runtime, RuntimeConfig};

fn run() -> Result<()> {
    let harness = HarnessConfig::default();
    log::info!(
        "starting: {} particles, point size {}, snapshots to {}",
        harness.particle_count,
        harness.point_size,
        harness.snapshot_path.display()
    );

    Runtime::run(RuntimeConfig::default(), GpuInit::default(), harness)
        .context("render loop failed")
}

fn main() {
    init_logging(LoggingConfig::default());

    if let Err(err) = run() {
        log::error!("{err:#}");
        std::process::exit(1);
    }

    log::info!("exited cleanly");
}
