//! Serial port settings for the bus adapter

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::info;

use crate::error::CaptureError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

impl Parity {
    fn to_serial(self) -> tokio_serial::Parity {
        match self {
            Parity::None => tokio_serial::Parity::None,
            Parity::Even => tokio_serial::Parity::Even,
            Parity::Odd => tokio_serial::Parity::Odd,
        }
    }
}

impl FromStr for Parity {
    type Err = String;

    /// Accepts `N`/`E`/`O` or the full name, case-insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "n" | "none" => Ok(Parity::None),
            "e" | "even" => Ok(Parity::Even),
            "o" | "odd" => Ok(Parity::Odd),
            _ => Err(format!("invalid parity '{}': expected N, E or O", s)),
        }
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parity::None => write!(f, "N"),
            Parity::Even => write!(f, "E"),
            Parity::Odd => write!(f, "O"),
        }
    }
}

/// Port and line settings, 19200 8N1 on /dev/ttyUSB0 by default
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    pub port: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: u8,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 19200,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
        }
    }
}

impl SerialSettings {
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            ..Default::default()
        }
    }

    fn data_bits(&self) -> Result<tokio_serial::DataBits, CaptureError> {
        match self.data_bits {
            5 => Ok(tokio_serial::DataBits::Five),
            6 => Ok(tokio_serial::DataBits::Six),
            7 => Ok(tokio_serial::DataBits::Seven),
            8 => Ok(tokio_serial::DataBits::Eight),
            n => Err(CaptureError::InvalidSettings(format!(
                "data bits must be 5-8, got {}",
                n
            ))),
        }
    }

    fn stop_bits(&self) -> Result<tokio_serial::StopBits, CaptureError> {
        match self.stop_bits {
            1 => Ok(tokio_serial::StopBits::One),
            2 => Ok(tokio_serial::StopBits::Two),
            n => Err(CaptureError::InvalidSettings(format!(
                "stop bits must be 1 or 2, got {}",
                n
            ))),
        }
    }

    /// Check that the line settings can be applied without opening the port
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.baud_rate == 0 {
            return Err(CaptureError::InvalidSettings("baud rate must be non-zero".into()));
        }
        self.data_bits()?;
        self.stop_bits()?;
        Ok(())
    }

    /// Open the port for async I/O
    pub fn open(&self) -> Result<SerialStream, CaptureError> {
        self.validate()?;

        let stream = tokio_serial::new(&self.port, self.baud_rate)
            .data_bits(self.data_bits()?)
            .parity(self.parity.to_serial())
            .stop_bits(self.stop_bits()?)
            .timeout(Duration::from_millis(100))
            .open_native_async()
            .map_err(|e| CaptureError::OpenFailed {
                port: self.port.clone(),
                reason: e.to_string(),
            })?;

        info!("Connected to {} at {} baud ({})", self.port, self.baud_rate, self);
        Ok(stream)
    }
}

impl fmt::Display for SerialSettings {
    /// Line settings in the usual `8N1` shorthand
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.data_bits, self.parity, self.stop_bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parity_parsing() {
        assert_eq!("N".parse::<Parity>().unwrap(), Parity::None);
        assert_eq!("even".parse::<Parity>().unwrap(), Parity::Even);
        assert_eq!("o".parse::<Parity>().unwrap(), Parity::Odd);
        assert_eq!(" ODD ".parse::<Parity>().unwrap(), Parity::Odd);
        assert!("x".parse::<Parity>().is_err());
        assert!("".parse::<Parity>().is_err());
        assert!("nope".parse::<Parity>().is_err());
        assert!("oops".parse::<Parity>().is_err());
        assert!("evenly".parse::<Parity>().is_err());
    }

    #[test]
    fn test_default_is_8n1() {
        let settings = SerialSettings::default();
        assert_eq!(settings.to_string(), "8N1");
        assert_eq!(settings.baud_rate, 19200);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_invalid_settings() {
        let mut settings = SerialSettings::new("/dev/null", 9600);
        settings.data_bits = 9;
        assert!(matches!(settings.validate(), Err(CaptureError::InvalidSettings(_))));

        let mut settings = SerialSettings::new("/dev/null", 9600);
        settings.stop_bits = 3;
        assert!(settings.validate().is_err());

        assert!(SerialSettings::new("/dev/null", 0).validate().is_err());
    }
}
