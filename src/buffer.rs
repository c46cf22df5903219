//! Fixed-capacity framing of samples into flushable chunks.
//!
//! Samples are stored as the raw byte pairs that end up in the capture file,
//! so a full buffer can be handed to the sink without another pass.

use std::mem;

use crate::{
    error::{CaptureError, Result},
    sample::Sample,
};

#[derive(Debug)]
pub struct SampleBuffer {
    bytes: Vec<u8>,
    capacity: usize,
}

impl SampleBuffer {
    /// `capacity` is in samples and never changes for the life of the buffer
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "sample buffer capacity must be non-zero");
        Self {
            bytes: Vec::with_capacity(capacity * 2),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of samples currently held
    pub fn len(&self) -> usize {
        self.bytes.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity
    }

    pub fn append(&mut self, sample: Sample) -> Result<()> {
        if self.is_full() {
            return Err(CaptureError::BufferOverflow {
                capacity: self.capacity,
            });
        }
        self.bytes.extend_from_slice(&sample.to_bytes());
        Ok(())
    }

    /// Hand back everything accumulated and start over with an empty buffer
    pub fn drain(&mut self) -> Vec<u8> {
        mem::replace(&mut self.bytes, Vec::with_capacity(self.capacity * 2))
    }

    /// The first `n` samples, for quick sanity logging
    pub fn head(&self, n: usize) -> Vec<u16> {
        self.bytes
            .chunks_exact(2)
            .take(n)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    }
}
