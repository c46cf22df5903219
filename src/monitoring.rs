//! In this module, we implement all the monitoring logic for the SPI capture.
//! Every channel keeps a set of atomic counters that the supervisor can read
//! while the channel runs, and the structured events (flushes, transfer errors
//! and state changes) all go out through `tracing` from here.

use std::{
    fmt,
    sync::atomic::{AtomicU64, AtomicU8, Ordering},
};

use tracing::{debug, error, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ChannelState {
    Unconfigured = 0,
    Configured = 1,
    Running = 2,
    Faulted = 3,
    ShuttingDown = 4,
}

impl ChannelState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Configured,
            2 => Self::Running,
            3 => Self::Faulted,
            4 => Self::ShuttingDown,
            _ => Self::Unconfigured,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Faulted | Self::ShuttingDown)
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unconfigured => "unconfigured",
            Self::Configured => "configured",
            Self::Running => "running",
            Self::Faulted => "faulted",
            Self::ShuttingDown => "shutting down",
        };
        f.write_str(s)
    }
}

/// Runtime counters for one channel, shared read-only with the supervisor
#[derive(Debug)]
pub struct ChannelStats {
    state: AtomicU8,
    pub samples: AtomicU64,
    pub flushes: AtomicU64,
    pub bytes_written: AtomicU64,
    pub transfer_errors: AtomicU64,
    pub retries: AtomicU64,
}

impl Default for ChannelStats {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(ChannelState::Unconfigured as u8),
            samples: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            transfer_errors: AtomicU64::new(0),
            retries: AtomicU64::new(0),
        }
    }
}

impl ChannelStats {
    pub fn state(&self) -> ChannelState {
        ChannelState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Record a state machine transition and log it
    pub fn transition(&self, channel: &str, to: ChannelState) {
        let from = ChannelState::from_u8(self.state.swap(to as u8, Ordering::AcqRel));
        if to == ChannelState::Faulted {
            error!(channel, %from, %to, "channel state");
        } else {
            info!(channel, %from, %to, "channel state");
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            state: self.state(),
            samples: self.samples.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            transfer_errors: self.transfer_errors.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub state: ChannelState,
    pub samples: u64,
    pub flushes: u64,
    pub bytes_written: u64,
    pub transfer_errors: u64,
    pub retries: u64,
}

pub fn record_flush(stats: &ChannelStats, channel: &str, bytes: usize, partial: bool) {
    let n = stats.flushes.fetch_add(1, Ordering::Relaxed) + 1;
    let total = stats.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed) + bytes as u64;
    debug!(channel, flush = n, bytes, total, partial, "buffer flushed");
}

pub fn record_transfer_error(
    stats: &ChannelStats,
    channel: &str,
    attempt: u32,
    err: &dyn fmt::Display,
) {
    stats.transfer_errors.fetch_add(1, Ordering::Relaxed);
    warn!(channel, attempt, error = %err, "transfer error");
}

/// One-line summary for the end of a channel's life
pub fn log_summary(channel: &str, snap: &StatsSnapshot) {
    info!(
        channel,
        state = %snap.state,
        samples = snap.samples,
        flushes = snap.flushes,
        bytes = snap.bytes_written,
        transfer_errors = snap.transfer_errors,
        retries = snap.retries,
        "channel summary"
    );
}
