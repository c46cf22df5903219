//! Scripted stand-ins for the SPI bus and handshake GPIO

#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

use spi_slurper::{
    error::{CaptureError, Result},
    exfil::{FileSink, Sink},
    transport::{BusTransport, Handshake, Hardware, SpiMode},
    ChannelDescriptor,
};

/// What the fake hardware saw, in order
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Ready,
    Busy,
    Transfer(usize),
    TransferFailed(usize),
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

enum Source {
    /// Fixed bytes; clears the stop flag once the last one is delivered
    Script(VecDeque<u8>, Arc<AtomicBool>),
    /// Counts up forever
    Endless(u8),
}

pub struct FakeBus {
    source: Source,
    calls: usize,
    /// 1-based transfer calls that fail without consuming data
    fail_calls: Vec<usize>,
    /// Every call from this one on fails
    fail_from: Option<usize>,
    reject_config: bool,
    delay: Option<Duration>,
    log: EventLog,
}

impl FakeBus {
    pub fn scripted(bytes: &[u8], running: Arc<AtomicBool>, log: EventLog) -> Self {
        Self::new(Source::Script(bytes.iter().copied().collect(), running), log)
    }

    pub fn endless(log: EventLog) -> Self {
        Self::new(Source::Endless(0), log)
    }

    fn new(source: Source, log: EventLog) -> Self {
        Self {
            source,
            calls: 0,
            fail_calls: Vec::new(),
            fail_from: None,
            reject_config: false,
            delay: None,
            log,
        }
    }

    pub fn failing_calls(mut self, calls: &[usize]) -> Self {
        self.fail_calls = calls.to_vec();
        self
    }

    pub fn failing_from(mut self, call: usize) -> Self {
        self.fail_from = Some(call);
        self
    }

    pub fn rejecting_config(mut self) -> Self {
        self.reject_config = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl BusTransport for FakeBus {
    fn configure(&mut self, clock_hz: u32, mode: SpiMode) -> Result<()> {
        if self.reject_config {
            return Err(CaptureError::BusConfig {
                clock_hz,
                mode: mode.index(),
                reason: "rejected by fake".into(),
            });
        }
        Ok(())
    }

    fn transfer(&mut self, rx: &mut [u8]) -> Result<()> {
        self.calls += 1;
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        let fail = self.fail_calls.contains(&self.calls)
            || self.fail_from.map_or(false, |from| self.calls >= from);
        if fail {
            self.log.lock().unwrap().push(Event::TransferFailed(rx.len()));
            return Err(CaptureError::BusTransfer(format!(
                "injected failure on call {}",
                self.calls
            )));
        }
        match &mut self.source {
            Source::Script(bytes, running) => {
                for b in rx.iter_mut() {
                    *b = bytes.pop_front().unwrap_or(0);
                }
                if bytes.is_empty() {
                    running.store(false, Ordering::Release);
                }
            }
            Source::Endless(next) => {
                for b in rx.iter_mut() {
                    *b = *next;
                    *next = next.wrapping_add(1);
                }
            }
        }
        self.log.lock().unwrap().push(Event::Transfer(rx.len()));
        Ok(())
    }
}

pub struct FakePin {
    pin: u8,
    /// Successful busy writes left before the line starts failing
    busy_left: Option<usize>,
    log: EventLog,
}

impl Handshake for FakePin {
    fn set_ready(&mut self) -> Result<()> {
        self.log.lock().unwrap().push(Event::Ready);
        Ok(())
    }

    fn set_busy(&mut self) -> Result<()> {
        match self.busy_left.as_mut() {
            Some(0) => {
                return Err(CaptureError::Gpio {
                    pin: self.pin,
                    reason: "line stuck".into(),
                })
            }
            Some(n) => *n -= 1,
            None => {}
        }
        self.log.lock().unwrap().push(Event::Busy);
        Ok(())
    }
}

/// Hands out pre-built buses keyed by (bus, device)
pub struct FakeHardware {
    buses: Mutex<HashMap<(u8, u8), FakeBus>>,
    busy_limit: Option<usize>,
    log: EventLog,
}

impl FakeHardware {
    pub fn new(log: EventLog) -> Self {
        Self {
            buses: Mutex::new(HashMap::new()),
            busy_limit: None,
            log,
        }
    }

    /// Pins handed out after this accept `n` busy writes, then fail
    pub fn with_busy_failing_after(mut self, n: usize) -> Self {
        self.busy_limit = Some(n);
        self
    }

    pub fn with_bus(self, bus: u8, device: u8, fake: FakeBus) -> Self {
        self.buses.lock().unwrap().insert((bus, device), fake);
        self
    }
}

impl Hardware for FakeHardware {
    type Bus = FakeBus;
    type Pin = FakePin;

    fn open_bus(&self, bus: u8, device: u8) -> Result<FakeBus> {
        self.buses
            .lock()
            .unwrap()
            .remove(&(bus, device))
            .ok_or(CaptureError::BusOpen {
                bus,
                device,
                reason: "no such device".into(),
            })
    }

    fn claim_pin(&self, pin: u8) -> Result<FakePin> {
        Ok(FakePin {
            pin,
            busy_left: self.busy_limit,
            log: self.log.clone(),
        })
    }
}

/// Sink whose every write fails
pub struct BrokenSink;

impl Sink for BrokenSink {
    fn write(&mut self, _bytes: &[u8]) -> Result<()> {
        Err(CaptureError::SinkWrite {
            path: "broken".into(),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        })
    }
}

/// Sink opener for `Acquirer::configure`
pub fn file_sink(path: &Path) -> Result<FileSink> {
    FileSink::create(path)
}

pub fn new_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn descriptor(name: &str, bus: u8, dir: &Path, capacity: usize) -> ChannelDescriptor {
    ChannelDescriptor {
        name: name.to_string(),
        bus,
        device: 0,
        handshake_pin: Some(17 + bus),
        clock_hz: 500_000,
        mode: SpiMode::Mode0,
        paired: false,
        destination: dir.join(format!("{}.bin", name)),
        capacity,
        max_retries: 3,
    }
}

/// Little-endian byte stream for `samples`
pub fn to_bytes(samples: &[u16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}
