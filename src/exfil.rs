//! This module is responsible for getting full sample buffers onto disk

use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::{CaptureError, Result};

/// Durable destination for one channel's flushed buffers
pub trait Sink: Send {
    /// Append `bytes` after everything written so far
    fn write(&mut self, bytes: &[u8]) -> Result<()>;
}

/// Append-only capture file.
/// Created once when the channel starts and appended to forever after. An
/// existing file is never reopened, so two writers can't share a destination.
#[derive(Debug)]
pub struct FileSink {
    file: File,
    path: PathBuf,
}

impl FileSink {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let sink_err = |source| CaptureError::SinkWrite {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(sink_err)?;
        }
        let file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)
            .map_err(sink_err)?;
        info!(path = %path.display(), "opened capture file");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Sink for FileSink {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.file
            .write_all(bytes)
            .and_then(|_| self.file.sync_data())
            .map_err(|source| CaptureError::SinkWrite {
                path: self.path.clone(),
                source,
            })
    }
}

/// Compact UTC timestamp for capture file names, down to the millisecond
pub fn file_timestamp(time: &DateTime<Utc>) -> String {
    time.format("%Y%m%dT%H%M%S%.3f").to_string()
}

/// `<dir>/spi<bus>.<device>-<timestamp>.bin`
pub fn capture_path(dir: &Path, bus: u8, device: u8, time: &DateTime<Utc>) -> PathBuf {
    dir.join(format!("spi{}.{}-{}.bin", bus, device, file_timestamp(time)))
}
