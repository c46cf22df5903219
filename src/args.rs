//! Argument parsing for running from the command line

use std::{fmt, path::PathBuf, str::FromStr};

use chrono::{DateTime, Utc};
use clap::Parser;

use crate::{
    capture::ChannelDescriptor,
    error::CaptureError,
    exfil::capture_path,
    transport::SpiMode,
};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// First channel as BUS.DEVICE[:READY_PIN] (BCM numbering), or "none"
    #[clap(long, default_value = "0.0:17", value_parser = valid_channel)]
    pub chan_a: ChannelSpec,
    /// Second channel as BUS.DEVICE[:READY_PIN] (BCM numbering), or "none"
    #[clap(long, default_value = "1.0:27", value_parser = valid_channel)]
    pub chan_b: ChannelSpec,
    /// SPI clock rate in Hz (match the transmitter)
    #[clap(long, default_value_t = 500_000)]
    #[clap(value_parser = clap::value_parser!(u32).range(1..))]
    pub clock_hz: u32,
    /// SPI mode (0-3)
    #[clap(long, default_value = "0", value_parser = valid_mode)]
    pub mode: SpiMode,
    /// Samples per buffer (match the transmitter's buffer size)
    #[clap(short, long, default_value_t = crate::DEFAULT_CAPACITY)]
    #[clap(value_parser = valid_capacity)]
    pub capacity: usize,
    /// Retries of a failed transfer before the channel gives up
    #[clap(long, default_value_t = 3, value_parser = clap::value_parser!(u32))]
    pub max_retries: u32,
    /// Clock each sample in one two-byte transfer instead of two single bytes
    #[clap(long)]
    pub paired: bool,
    /// Directory to write capture files into
    #[clap(short, long, default_value = "data", value_parser = clap::value_parser!(PathBuf))]
    pub output_dir: PathBuf,
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity,
}

/// Where one channel lives on the hardware
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelSpec {
    Disabled,
    Enabled {
        bus: u8,
        device: u8,
        pin: Option<u8>,
    },
}

impl FromStr for ChannelSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("none") {
            return Ok(Self::Disabled);
        }
        let (link, pin) = match s.split_once(':') {
            Some((link, pin)) => (link, Some(pin)),
            None => (s, None),
        };
        let (bus, device) = link
            .split_once('.')
            .ok_or_else(|| format!("expected BUS.DEVICE, got '{}'", link))?;
        let num = |v: &str, what: &str| {
            v.parse::<u8>()
                .map_err(|_| format!("invalid {} '{}'", what, v))
        };
        Ok(Self::Enabled {
            bus: num(bus, "bus")?,
            device: num(device, "device")?,
            pin: pin.map(|p| num(p, "pin")).transpose()?,
        })
    }
}

impl fmt::Display for ChannelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("none"),
            Self::Enabled { bus, device, pin } => {
                write!(f, "{}.{}", bus, device)?;
                if let Some(pin) = pin {
                    write!(f, ":{}", pin)?;
                }
                Ok(())
            }
        }
    }
}

impl Args {
    /// Build the fixed per-channel configuration, stamping file names with `start`.
    /// Two channels can't share a bus device or a handshake pin.
    pub fn descriptors(
        &self,
        start: &DateTime<Utc>,
    ) -> crate::error::Result<Vec<ChannelDescriptor>> {
        let mut descriptors: Vec<ChannelDescriptor> = Vec::with_capacity(2);
        for spec in [self.chan_a, self.chan_b] {
            let (bus, device, pin) = match spec {
                ChannelSpec::Disabled => continue,
                ChannelSpec::Enabled { bus, device, pin } => (bus, device, pin),
            };
            for other in &descriptors {
                if other.bus == bus && other.device == device {
                    return Err(CaptureError::InvalidConfig(format!(
                        "both channels use SPI bus {} device {}",
                        bus, device
                    )));
                }
                if let Some(pin) = pin.filter(|p| other.handshake_pin == Some(*p)) {
                    return Err(CaptureError::InvalidConfig(format!(
                        "both channels use handshake pin {}",
                        pin
                    )));
                }
            }
            descriptors.push(ChannelDescriptor {
                name: format!("spi{}.{}", bus, device),
                bus,
                device,
                handshake_pin: pin,
                clock_hz: self.clock_hz,
                mode: self.mode,
                paired: self.paired,
                destination: capture_path(&self.output_dir, bus, device, start),
                capacity: self.capacity,
                max_retries: self.max_retries,
            });
        }
        Ok(descriptors)
    }
}

/// Match verbosity filter with tracing subscriber log levels
pub fn convert_filter(filter: log::LevelFilter) -> tracing_subscriber::filter::LevelFilter {
    match filter {
        log::LevelFilter::Off => tracing_subscriber::filter::LevelFilter::OFF,
        log::LevelFilter::Error => tracing_subscriber::filter::LevelFilter::ERROR,
        log::LevelFilter::Warn => tracing_subscriber::filter::LevelFilter::WARN,
        log::LevelFilter::Info => tracing_subscriber::filter::LevelFilter::INFO,
        log::LevelFilter::Debug => tracing_subscriber::filter::LevelFilter::DEBUG,
        log::LevelFilter::Trace => tracing_subscriber::filter::LevelFilter::TRACE,
    }
}

fn valid_channel(s: &str) -> Result<ChannelSpec, String> {
    s.parse()
}

fn valid_mode(s: &str) -> Result<SpiMode, String> {
    s.parse::<u8>()
        .ok()
        .and_then(SpiMode::from_index)
        .ok_or_else(|| format!("SPI mode must be 0, 1, 2 or 3, got '{}'", s))
}

fn valid_capacity(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("capacity must be at least one sample".to_string()),
        Ok(n) => Ok(n),
        Err(_) => Err("Invalid capacity".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_channel_spec() {
        assert_eq!(
            "0.0:17".parse::<ChannelSpec>().unwrap(),
            ChannelSpec::Enabled {
                bus: 0,
                device: 0,
                pin: Some(17)
            }
        );
        assert_eq!(
            "1.2".parse::<ChannelSpec>().unwrap(),
            ChannelSpec::Enabled {
                bus: 1,
                device: 2,
                pin: None
            }
        );
        assert_eq!("none".parse::<ChannelSpec>().unwrap(), ChannelSpec::Disabled);
        assert!("0:17".parse::<ChannelSpec>().is_err());
        assert!("0.0:gpio".parse::<ChannelSpec>().is_err());
    }

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["spi_slurper"]);
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let ds = args.descriptors(&t).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds[0].name, "spi0.0");
        assert_eq!(ds[0].handshake_pin, Some(17));
        assert_eq!(ds[1].name, "spi1.0");
        assert_eq!(ds[1].handshake_pin, Some(27));
        assert_eq!(ds[0].capacity, 32768);
        assert_eq!(ds[0].clock_hz, 500_000);
        assert_eq!(ds[0].mode, SpiMode::Mode0);
        assert!(!ds[0].paired);
        assert_ne!(ds[0].destination, ds[1].destination);
    }

    #[test]
    fn test_disable_channel() {
        let args = Args::parse_from(["spi_slurper", "--chan-b", "none", "--capacity", "10000"]);
        let ds = args.descriptors(&Utc::now()).unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(ds[0].capacity, 10000);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(Args::try_parse_from(["spi_slurper", "--capacity", "0"]).is_err());
    }

    #[test]
    fn test_mode() {
        let args = Args::parse_from(["spi_slurper", "--mode", "3"]);
        assert_eq!(args.descriptors(&Utc::now()).unwrap()[0].mode, SpiMode::Mode3);
        assert!(Args::try_parse_from(["spi_slurper", "--mode", "4"]).is_err());
        assert!(Args::try_parse_from(["spi_slurper", "--mode", "x"]).is_err());
    }

    #[test]
    fn test_shared_device_rejected() {
        let args = Args::parse_from(["spi_slurper", "--chan-a", "0.0:17", "--chan-b", "0.0:27"]);
        match args.descriptors(&Utc::now()) {
            Err(CaptureError::InvalidConfig(msg)) => assert!(msg.contains("bus 0 device 0")),
            other => panic!("expected invalid config, got {:?}", other),
        }
    }

    #[test]
    fn test_shared_pin_rejected() {
        let args = Args::parse_from(["spi_slurper", "--chan-a", "0.0:17", "--chan-b", "1.0:17"]);
        assert!(matches!(
            args.descriptors(&Utc::now()),
            Err(CaptureError::InvalidConfig(_))
        ));
        // Two unpaced channels don't conflict
        let args = Args::parse_from(["spi_slurper", "--chan-a", "0.0", "--chan-b", "1.0"]);
        assert_eq!(args.descriptors(&Utc::now()).unwrap().len(), 2);
    }
}
