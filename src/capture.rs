//! This module contains all the capture logic

// Each channel thread does one thing, as steadily as possible:
// clock words off its SPI bus behind the handshake line, pack them into a
// fixed-size buffer, and push every full buffer to its sink. Nothing is shared
// with the sibling channel except the stop flag.

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use tracing::{debug, error, info, warn};

use crate::{
    buffer::SampleBuffer,
    error::{CaptureError, Result},
    exfil::Sink,
    monitoring::{record_flush, record_transfer_error, ChannelState, ChannelStats},
    sample::Sample,
    transport::{BusTransport, Handshake, Hardware, SpiMode},
};

/// How many samples to log after the first flush
const HEAD_LOG_LEN: usize = 20;

/// Static configuration of one acquisition channel
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelDescriptor {
    pub name: String,
    pub bus: u8,
    pub device: u8,
    /// Ready/busy output, if the transmitter is paced
    pub handshake_pin: Option<u8>,
    pub clock_hz: u32,
    pub mode: SpiMode,
    /// One two-byte transfer per sample instead of two single-byte transfers
    pub paired: bool,
    pub destination: PathBuf,
    /// In samples
    pub capacity: usize,
    /// Consecutive failed attempts of one sample before the channel faults
    pub max_retries: u32,
}

/// How a channel's run loop ended
#[derive(Debug)]
pub enum Exit {
    /// Stop was requested and everything acquired was flushed
    Stopped,
    Faulted(CaptureError),
}

/// Owns one SPI link end-to-end
pub struct Acquirer<B, H, S> {
    descriptor: ChannelDescriptor,
    bus: B,
    handshake: Option<H>,
    sink: S,
    buffer: SampleBuffer,
    stats: Arc<ChannelStats>,
}

impl<B, H, S> Acquirer<B, H, S>
where
    B: BusTransport,
    H: Handshake,
    S: Sink,
{
    /// Open and configure the bus (and handshake pin) described by `descriptor`,
    /// then open its sink with `open_sink`. The sink is only created once the
    /// hardware is ready. Any failure here is fatal for the channel, we never
    /// fall back to defaults.
    pub fn configure<W, F>(
        descriptor: ChannelDescriptor,
        hardware: &W,
        open_sink: F,
        stats: Arc<ChannelStats>,
    ) -> Result<Self>
    where
        W: Hardware<Bus = B, Pin = H>,
        F: FnOnce(&Path) -> Result<S>,
    {
        let name = descriptor.name.clone();
        let result = Self::open(descriptor, hardware, open_sink, stats.clone());
        match &result {
            Ok(_) => stats.transition(&name, ChannelState::Configured),
            Err(e) => {
                error!(channel = %name, error = %e, "channel configuration failed");
                stats.transition(&name, ChannelState::Faulted);
            }
        }
        result
    }

    fn open<W, F>(
        descriptor: ChannelDescriptor,
        hardware: &W,
        open_sink: F,
        stats: Arc<ChannelStats>,
    ) -> Result<Self>
    where
        W: Hardware<Bus = B, Pin = H>,
        F: FnOnce(&Path) -> Result<S>,
    {
        if descriptor.capacity == 0 {
            return Err(CaptureError::InvalidConfig(format!(
                "{}: buffer capacity must be at least one sample",
                descriptor.name
            )));
        }
        let mut bus = hardware.open_bus(descriptor.bus, descriptor.device)?;
        bus.configure(descriptor.clock_hz, descriptor.mode)?;
        let handshake = match descriptor.handshake_pin {
            Some(pin) => {
                let mut h = hardware.claim_pin(pin)?;
                h.set_busy()?;
                Some(h)
            }
            None => None,
        };
        let sink = open_sink(&descriptor.destination)?;
        info!(
            channel = %descriptor.name,
            bus = descriptor.bus,
            device = descriptor.device,
            pin = ?descriptor.handshake_pin,
            clock_hz = descriptor.clock_hz,
            mode = %descriptor.mode,
            capacity = descriptor.capacity,
            "channel configured"
        );
        Ok(Self {
            buffer: SampleBuffer::new(descriptor.capacity),
            descriptor,
            bus,
            handshake,
            sink,
            stats,
        })
    }

    pub fn descriptor(&self) -> &ChannelDescriptor {
        &self.descriptor
    }

    /// Acquire until `running` goes false or the channel faults.
    /// The flag is only checked between transfer cycles.
    pub fn run(mut self, running: &AtomicBool) -> Exit {
        let name = self.descriptor.name.clone();
        self.stats.transition(&name, ChannelState::Running);
        let exit = match self.acquire(running) {
            Ok(()) => match self.flush_partial() {
                Ok(()) => Exit::Stopped,
                Err(e) => Exit::Faulted(e),
            },
            Err(e) => Exit::Faulted(e),
        };
        // Never leave the transmitter believing we're ready
        if let Some(h) = self.handshake.as_mut() {
            if let Err(e) = h.set_busy() {
                warn!(channel = %name, error = %e, "failed to release handshake line");
            }
        }
        match &exit {
            Exit::Stopped => self.stats.transition(&name, ChannelState::ShuttingDown),
            Exit::Faulted(e) => {
                error!(channel = %name, error = %e, "channel fault");
                self.stats.transition(&name, ChannelState::Faulted);
            }
        }
        exit
    }

    fn acquire(&mut self, running: &AtomicBool) -> Result<()> {
        while running.load(Ordering::Acquire) {
            let sample = self.read_sample()?;
            self.buffer.append(sample)?;
            self.stats.samples.fetch_add(1, Ordering::Relaxed);
            if self.buffer.is_full() {
                self.flush(false)?;
            }
        }
        Ok(())
    }

    /// One sample, retrying transient transfer failures up to the budget.
    /// Bytes already clocked in survive a retry, so a failed attempt can't
    /// duplicate or skip anything.
    fn read_sample(&mut self) -> Result<Sample> {
        let mut bytes = [0u8; 2];
        let mut filled = 0usize;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.paced_transfer(&mut bytes, &mut filled) {
                Ok(()) => return Ok(Sample::from_bytes(bytes[0], bytes[1])),
                Err(e) if e.is_transient() => {
                    record_transfer_error(&self.stats, &self.descriptor.name, attempt, &e);
                    if attempt > self.descriptor.max_retries {
                        return Err(CaptureError::RetriesExhausted {
                            attempts: attempt,
                            last: e.to_string(),
                        });
                    }
                    self.stats.retries.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// ready -> transfer -> busy, with nothing else inside the bracket
    fn paced_transfer(&mut self, bytes: &mut [u8; 2], filled: &mut usize) -> Result<()> {
        if let Some(h) = self.handshake.as_mut() {
            h.set_ready()?;
        }
        let transferred = self.transfer_remaining(bytes, filled);
        // Deassert even when the transfer failed
        if let Some(h) = self.handshake.as_mut() {
            h.set_busy()?;
        }
        transferred
    }

    fn transfer_remaining(&mut self, bytes: &mut [u8; 2], filled: &mut usize) -> Result<()> {
        if self.descriptor.paired {
            self.bus.transfer(&mut bytes[..])?;
            *filled = 2;
        } else {
            // Low byte, then high byte
            while *filled < 2 {
                self.bus.transfer(&mut bytes[*filled..*filled + 1])?;
                *filled += 1;
            }
        }
        Ok(())
    }

    fn flush(&mut self, partial: bool) -> Result<()> {
        let first = self.stats.flushes.load(Ordering::Relaxed) == 0;
        if first {
            debug!(
                channel = %self.descriptor.name,
                head = ?self.buffer.head(HEAD_LOG_LEN),
                "first buffer"
            );
        }
        let bytes = self.buffer.drain();
        self.sink.write(&bytes)?;
        record_flush(&self.stats, &self.descriptor.name, bytes.len(), partial);
        Ok(())
    }

    /// On a clean stop, whatever was acquired mid-buffer still goes to disk
    fn flush_partial(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        info!(
            channel = %self.descriptor.name,
            samples = self.buffer.len(),
            "flushing partial buffer on shutdown"
        );
        self.flush(true)
    }
}
