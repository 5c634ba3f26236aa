//! Serial port enumeration
//!
//! Bus taps are almost always a USB RS-485 dongle, so ports are tagged with
//! the adapter chip when the vendor ID is recognized.

use serde::Serialize;
use serialport::{available_ports, SerialPortType};
use tracing::{debug, info};

use crate::error::DetectError;

/// USB-to-serial chip families common on RS-485 dongles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AdapterChip {
    Ftdi,
    Ch340,
    Cp210x,
    Pl2303,
}

impl AdapterChip {
    pub fn from_vid(vid: u16) -> Option<Self> {
        match vid {
            0x0403 => Some(AdapterChip::Ftdi),
            0x1A86 => Some(AdapterChip::Ch340),
            0x10C4 => Some(AdapterChip::Cp210x),
            0x067B => Some(AdapterChip::Pl2303),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AdapterChip::Ftdi => "FTDI",
            AdapterChip::Ch340 => "CH340",
            AdapterChip::Cp210x => "CP210x",
            AdapterChip::Pl2303 => "PL2303",
        }
    }
}

/// A serial port that could be attached to the bus
#[derive(Debug, Clone, Serialize)]
pub struct SerialPortInfo {
    /// e.g. /dev/ttyUSB0, COM3
    pub port: String,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub adapter: Option<AdapterChip>,
}

impl SerialPortInfo {
    fn from_serialport(name: String, port_type: &SerialPortType) -> Self {
        match port_type {
            SerialPortType::UsbPort(usb) => Self {
                port: name,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                manufacturer: usb.manufacturer.clone(),
                product: usb.product.clone(),
                adapter: AdapterChip::from_vid(usb.vid),
            },
            _ => Self {
                port: name,
                vid: None,
                pid: None,
                manufacturer: None,
                product: None,
                adapter: None,
            },
        }
    }

    /// Short human-readable description
    pub fn description(&self) -> String {
        match (&self.adapter, &self.product) {
            (Some(chip), Some(product)) => format!("{} ({})", product, chip.name()),
            (Some(chip), None) => format!("{} USB serial", chip.name()),
            (None, Some(product)) => product.clone(),
            (None, None) => "Unknown".to_string(),
        }
    }
}

/// Port enumeration settings
#[derive(Debug, Clone, Default)]
pub struct ScannerConfig {
    /// Skip ports whose name contains any of these
    pub skip_patterns: Vec<String>,
}

/// Lists candidate serial ports
pub struct PortScanner {
    config: ScannerConfig,
}

impl PortScanner {
    pub fn new() -> Self {
        Self {
            config: ScannerConfig {
                // macOS Bluetooth and debug consoles are never bus taps
                skip_patterns: vec!["Bluetooth".to_string(), "debug".to_string()],
            },
        }
    }

    pub fn with_config(config: ScannerConfig) -> Self {
        Self { config }
    }

    /// Enumerate ports, USB adapters first
    pub fn enumerate_ports(&self) -> Result<Vec<SerialPortInfo>, DetectError> {
        debug!("Enumerating serial ports");
        let ports = available_ports().map_err(|e| DetectError::EnumerationFailed(e.to_string()))?;

        let mut result: Vec<_> = ports
            .into_iter()
            .map(|p| SerialPortInfo::from_serialport(p.port_name, &p.port_type))
            .filter(|p| !self.should_skip_port(p))
            .collect();
        result.sort_by_key(|p| (p.adapter.is_none(), p.port.clone()));

        info!("Found {} serial port(s)", result.len());
        Ok(result)
    }

    fn should_skip_port(&self, port: &SerialPortInfo) -> bool {
        self.config
            .skip_patterns
            .iter()
            .any(|pattern| port.port.contains(pattern.as_str()))
    }
}

impl Default for PortScanner {
    fn default() -> Self {
        Self::new()
    }
}
