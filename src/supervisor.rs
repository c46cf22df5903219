//! Process-wide lifecycle: one thread per channel, a shared stop flag, and
//! reports collected as each channel reaches a terminal state.

use std::{
    sync::{atomic::AtomicBool, Arc},
    thread,
};

use crossbeam_channel::unbounded;
use tracing::{error, info, info_span, warn};

use crate::{
    capture::{Acquirer, ChannelDescriptor, Exit},
    exfil::FileSink,
    monitoring::{log_summary, ChannelStats, StatsSnapshot},
    transport::Hardware,
};

/// Terminal outcome of one channel
#[derive(Debug)]
pub struct ChannelReport {
    pub name: String,
    pub exit: Exit,
    pub stats: StatsSnapshot,
}

impl ChannelReport {
    pub fn is_fault(&self) -> bool {
        matches!(self.exit, Exit::Faulted(_))
    }
}

pub struct Supervisor {
    channels: Vec<(ChannelDescriptor, Arc<ChannelStats>)>,
    running: Arc<AtomicBool>,
}

impl Supervisor {
    pub fn new(descriptors: Vec<ChannelDescriptor>, running: Arc<AtomicBool>) -> Self {
        let channels = descriptors
            .into_iter()
            .map(|d| (d, Arc::new(ChannelStats::default())))
            .collect();
        Self { channels, running }
    }

    /// Live counters for the channel called `name`
    pub fn stats(&self, name: &str) -> Option<Arc<ChannelStats>> {
        self.channels
            .iter()
            .find(|(d, _)| d.name == name)
            .map(|(_, s)| s.clone())
    }

    /// Run every channel to completion. A faulted channel is reported and left
    /// dead; the others keep going until the stop flag is cleared.
    pub fn run<W: Hardware>(&self, hardware: &W) -> Vec<ChannelReport> {
        let (report_tx, report_rx) = unbounded();
        let mut reports = Vec::with_capacity(self.channels.len());

        thread::scope(|s| {
            for (descriptor, stats) in &self.channels {
                let report_tx = report_tx.clone();
                let running = &*self.running;
                let spawned = thread::Builder::new()
                    .name(descriptor.name.clone())
                    .spawn_scoped(s, move || {
                        let span = info_span!("channel", name = %descriptor.name);
                        let _enter = span.enter();
                        let exit = run_channel(descriptor.clone(), hardware, stats.clone(), running);
                        let _ = report_tx.send(ChannelReport {
                            name: descriptor.name.clone(),
                            exit,
                            stats: stats.snapshot(),
                        });
                    });
                if let Err(e) = spawned {
                    error!(channel = %descriptor.name, error = %e, "failed to spawn channel thread");
                }
            }
            drop(report_tx);

            let mut remaining = self.channels.len();
            for report in report_rx.iter() {
                remaining -= 1;
                log_summary(&report.name, &report.stats);
                match &report.exit {
                    Exit::Stopped => info!(channel = %report.name, "channel stopped"),
                    Exit::Faulted(e) => warn!(
                        channel = %report.name,
                        error = %e,
                        still_running = remaining,
                        "channel faulted, leaving siblings running"
                    ),
                }
                reports.push(report);
            }
        });

        reports
    }
}

fn run_channel<W: Hardware>(
    descriptor: ChannelDescriptor,
    hardware: &W,
    stats: Arc<ChannelStats>,
    running: &AtomicBool,
) -> Exit {
    match Acquirer::configure(descriptor, hardware, |p| FileSink::create(p), stats) {
        Ok(acquirer) => acquirer.run(running),
        Err(e) => Exit::Faulted(e),
    }
}
