/// One 16-bit data point reassembled from two bus bytes
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub struct Sample(u16);

impl Sample {
    pub fn new(value: u16) -> Self {
        Self(value)
    }

    /// The transmitter sends the low byte first, then the high byte
    pub fn from_bytes(low: u8, high: u8) -> Self {
        Self(((high as u16) << 8) | low as u16)
    }

    pub fn value(self) -> u16 {
        self.0
    }

    /// Bytes in capture file order (low, high)
    pub fn to_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }
}

impl From<u16> for Sample {
    fn from(value: u16) -> Self {
        Self(value)
    }
}
