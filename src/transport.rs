//! Seams to the hardware: the SPI bus and the ready/busy handshake line.
//!
//! The acquisition loop only ever talks to these traits, so it can be driven
//! by real spidev/GPIO handles on the Pi or by scripted fakes in tests.

use std::fmt;

use crate::error::Result;

/// SPI clock polarity and phase
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SpiMode {
    /// CPOL 0, CPHA 0
    #[default]
    Mode0,
    /// CPOL 0, CPHA 1
    Mode1,
    /// CPOL 1, CPHA 0
    Mode2,
    /// CPOL 1, CPHA 1
    Mode3,
}

impl SpiMode {
    pub fn from_index(idx: u8) -> Option<Self> {
        match idx {
            0 => Some(Self::Mode0),
            1 => Some(Self::Mode1),
            2 => Some(Self::Mode2),
            3 => Some(Self::Mode3),
            _ => None,
        }
    }

    pub fn index(self) -> u8 {
        match self {
            Self::Mode0 => 0,
            Self::Mode1 => 1,
            Self::Mode2 => 2,
            Self::Mode3 => 3,
        }
    }
}

impl fmt::Display for SpiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// One opened SPI link
pub trait BusTransport: Send {
    fn configure(&mut self, clock_hz: u32, mode: SpiMode) -> Result<()>;

    /// Clock in exactly `rx.len()` bytes, blocking until the transfer completes
    fn transfer(&mut self, rx: &mut [u8]) -> Result<()>;
}

/// The GPIO output telling the transmitter whether we can take the next word
pub trait Handshake: Send {
    fn set_ready(&mut self) -> Result<()>;
    fn set_busy(&mut self) -> Result<()>;
}

/// Hands out bus and pin handles, one set per channel
pub trait Hardware: Sync {
    type Bus: BusTransport;
    type Pin: Handshake;

    fn open_bus(&self, bus: u8, device: u8) -> Result<Self::Bus>;

    /// Claims `pin` as an output, starting out busy (low)
    fn claim_pin(&self, pin: u8) -> Result<Self::Pin>;
}

/// Raspberry Pi spidev and GPIO (BCM numbering) via rppal
#[cfg(feature = "rpi")]
pub mod rpi {
    use rppal::{
        gpio::{Gpio, OutputPin},
        spi::{Bus, Mode, SlaveSelect, Spi},
    };

    use super::{BusTransport, Handshake, Hardware, SpiMode};
    use crate::error::{CaptureError, Result};

    // Placeholder rate until `configure` runs
    const OPEN_CLOCK_HZ: u32 = 500_000;

    pub struct RpiHardware {
        gpio: Gpio,
    }

    impl RpiHardware {
        pub fn new() -> Result<Self> {
            let gpio = Gpio::new().map_err(|e| CaptureError::Gpio {
                pin: 0,
                reason: e.to_string(),
            })?;
            Ok(Self { gpio })
        }
    }

    fn spi_bus(bus: u8) -> Option<Bus> {
        Some(match bus {
            0 => Bus::Spi0,
            1 => Bus::Spi1,
            2 => Bus::Spi2,
            3 => Bus::Spi3,
            4 => Bus::Spi4,
            5 => Bus::Spi5,
            6 => Bus::Spi6,
            _ => return None,
        })
    }

    fn slave_select(device: u8) -> Option<SlaveSelect> {
        Some(match device {
            0 => SlaveSelect::Ss0,
            1 => SlaveSelect::Ss1,
            2 => SlaveSelect::Ss2,
            3 => SlaveSelect::Ss3,
            _ => return None,
        })
    }

    fn spi_mode(mode: SpiMode) -> Mode {
        match mode {
            SpiMode::Mode0 => Mode::Mode0,
            SpiMode::Mode1 => Mode::Mode1,
            SpiMode::Mode2 => Mode::Mode2,
            SpiMode::Mode3 => Mode::Mode3,
        }
    }

    pub struct RpiBus {
        spi: Spi,
    }

    impl BusTransport for RpiBus {
        fn configure(&mut self, clock_hz: u32, mode: SpiMode) -> Result<()> {
            let config_err = |e: rppal::spi::Error| CaptureError::BusConfig {
                clock_hz,
                mode: mode.index(),
                reason: e.to_string(),
            };
            self.spi.set_mode(spi_mode(mode)).map_err(config_err)?;
            self.spi.set_clock_speed(clock_hz).map_err(config_err)?;
            Ok(())
        }

        fn transfer(&mut self, rx: &mut [u8]) -> Result<()> {
            let n = self
                .spi
                .read(rx)
                .map_err(|e| CaptureError::BusTransfer(e.to_string()))?;
            if n != rx.len() {
                return Err(CaptureError::BusTransfer(format!(
                    "short read: {} of {} bytes",
                    n,
                    rx.len()
                )));
            }
            Ok(())
        }
    }

    pub struct RpiPin {
        pin: OutputPin,
    }

    impl Handshake for RpiPin {
        fn set_ready(&mut self) -> Result<()> {
            self.pin.set_high();
            Ok(())
        }

        fn set_busy(&mut self) -> Result<()> {
            self.pin.set_low();
            Ok(())
        }
    }

    impl Hardware for RpiHardware {
        type Bus = RpiBus;
        type Pin = RpiPin;

        fn open_bus(&self, bus: u8, device: u8) -> Result<RpiBus> {
            let open_err = |reason: String| CaptureError::BusOpen {
                bus,
                device,
                reason,
            };
            let spi_bus = spi_bus(bus).ok_or_else(|| open_err("no such bus".into()))?;
            let ss = slave_select(device).ok_or_else(|| open_err("no such device".into()))?;
            let spi = Spi::new(spi_bus, ss, OPEN_CLOCK_HZ, Mode::Mode0)
                .map_err(|e| open_err(e.to_string()))?;
            Ok(RpiBus { spi })
        }

        fn claim_pin(&self, pin: u8) -> Result<RpiPin> {
            let pin = self
                .gpio
                .get(pin)
                .map_err(|e| CaptureError::Gpio {
                    pin,
                    reason: e.to_string(),
                })?
                .into_output_low();
            Ok(RpiPin { pin })
        }
    }
}
