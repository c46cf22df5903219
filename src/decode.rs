//! Offline decoding of capture files into printable samples

use std::{fmt, fs, path::Path, str::FromStr};

use crate::error::{CaptureError, Result};

/// How each 16-bit word should be rendered
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Uint16,
    Int16,
    Hex,
}

impl Format {
    pub fn render(self, word: u16) -> String {
        match self {
            Format::Uint16 => word.to_string(),
            Format::Int16 => (word as i16).to_string(),
            Format::Hex => format!("{:04x}", word),
        }
    }

    /// Prefix printed in front of each value on the command line
    pub fn prefix(self) -> &'static str {
        match self {
            Format::Hex => "0x",
            _ => "",
        }
    }
}

impl FromStr for Format {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "uint16" => Ok(Format::Uint16),
            "int16" => Ok(Format::Int16),
            "hex" => Ok(Format::Hex),
            other => Err(CaptureError::UnsupportedFormat(other.to_owned())),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Format::Uint16 => "uint16",
            Format::Int16 => "int16",
            Format::Hex => "hex",
        };
        f.write_str(s)
    }
}

/// Lazy `(index, rendered value)` sequence over a capture's bytes
pub struct Decoded<'a> {
    words: std::iter::Enumerate<std::slice::ChunksExact<'a, u8>>,
    format: Format,
}

impl Iterator for Decoded<'_> {
    type Item = (usize, String);

    fn next(&mut self) -> Option<Self::Item> {
        self.words
            .next()
            .map(|(i, pair)| (i, self.format.render(u16::from_le_bytes([pair[0], pair[1]]))))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.words.size_hint()
    }
}

impl ExactSizeIterator for Decoded<'_> {}

/// Decode raw capture bytes. Odd-length input is rejected outright rather than
/// silently dropping the trailing byte.
pub fn decode_bytes(bytes: &[u8], format: Format) -> Result<Decoded<'_>> {
    if bytes.len() % 2 != 0 {
        return Err(CaptureError::TruncatedFile { len: bytes.len() });
    }
    Ok(Decoded {
        words: bytes.chunks_exact(2).enumerate(),
        format,
    })
}

/// Read a whole capture file; pair with [`decode_bytes`] to iterate it
pub fn read_capture<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    let path = path.as_ref();
    fs::read(path).map_err(|source| CaptureError::ReadCapture {
        path: path.to_path_buf(),
        source,
    })
}
