use std::path::PathBuf;

use thiserror::Error;

/// All errors produced while capturing or decoding.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to open SPI bus {bus} device {device}: {reason}")]
    BusOpen { bus: u8, device: u8, reason: String },

    #[error("SPI bus rejected configuration ({clock_hz} Hz, mode {mode}): {reason}")]
    BusConfig {
        clock_hz: u32,
        mode: u8,
        reason: String,
    },

    #[error("invalid channel configuration: {0}")]
    InvalidConfig(String),

    #[error("SPI transfer failed: {0}")]
    BusTransfer(String),

    #[error("handshake pin {pin} error: {reason}")]
    Gpio { pin: u8, reason: String },

    #[error("sample buffer overflow (capacity {capacity})")]
    BufferOverflow { capacity: usize },

    #[error("failed to write capture file {path}: {source}")]
    SinkWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("transfer retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("failed to read capture file {path}: {source}")]
    ReadCapture {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("capture file has an odd length of {len} bytes")]
    TruncatedFile { len: usize },

    #[error("unsupported format '{0}' (expected uint16, int16 or hex)")]
    UnsupportedFormat(String),
}

impl CaptureError {
    /// Transfer errors are the only ones worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, CaptureError::BusTransfer(_))
    }
}

pub type Result<T> = std::result::Result<T, CaptureError>;
