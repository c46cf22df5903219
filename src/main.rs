use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::bail;
use chrono::Utc;
use clap::Parser;
use spi_slurper::{args::Args, supervisor::Supervisor};
use tracing::{info, warn};

fn main() -> anyhow::Result<()> {
    // Get the CLI options
    let cli = Args::parse();
    // Setup logging
    let filter = spi_slurper::args::convert_filter(cli.verbose.log_level_filter());
    tracing_subscriber::fmt().with_max_level(filter).init();

    let descriptors = cli.descriptors(&Utc::now())?;
    if descriptors.is_empty() {
        bail!("both channels are disabled, nothing to capture");
    }
    for d in &descriptors {
        info!(channel = %d.name, path = %d.destination.display(), "capture destination");
    }

    // Stop everything cleanly on ctrl-c
    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = running.clone();
    ctrlc::set_handler(move || {
        warn!("interrupt received, stopping channels");
        handler_flag.store(false, Ordering::Release);
    })?;

    let supervisor = Supervisor::new(descriptors, running);
    let reports = run(&supervisor)?;

    let faulted: Vec<_> = reports
        .iter()
        .filter(|r| r.is_fault())
        .map(|r| r.name.as_str())
        .collect();
    if !faulted.is_empty() {
        bail!("channel(s) faulted: {}", faulted.join(", "));
    }
    info!("all channels stopped cleanly");
    Ok(())
}

#[cfg(feature = "rpi")]
fn run(supervisor: &Supervisor) -> anyhow::Result<Vec<spi_slurper::ChannelReport>> {
    let hw = spi_slurper::transport::rpi::RpiHardware::new()?;
    Ok(supervisor.run(&hw))
}

#[cfg(not(feature = "rpi"))]
fn run(_supervisor: &Supervisor) -> anyhow::Result<Vec<spi_slurper::ChannelReport>> {
    bail!("compiled without the rpi feature, no SPI hardware backend available")
}
