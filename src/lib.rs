//! Lossless capture of 16-bit sample streams from paced SPI links.
//!
//! ```text
//! SPI bus ─(ready/busy handshake)─> Acquirer ─> SampleBuffer ─(full)─> Sink (capture file)
//! ```
//!
//! One [`capture::Acquirer`] runs per link on its own thread, started and
//! joined by the [`supervisor::Supervisor`]. Capture files are raw
//! little-endian 16-bit words and are read back with [`decode`].

pub mod args;
pub mod buffer;
pub mod capture;
pub mod decode;
pub mod error;
pub mod exfil;
pub mod monitoring;
pub mod sample;
pub mod supervisor;
pub mod transport;

pub use capture::{Acquirer, ChannelDescriptor, Exit};
pub use error::{CaptureError, Result};
pub use sample::Sample;
pub use supervisor::{ChannelReport, Supervisor};

/// Samples per buffer on the transmitter side
pub const DEFAULT_CAPACITY: usize = 32768;
