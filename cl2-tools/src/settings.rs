//! Tool settings
//!
//! Stored as JSON in the XDG config directory. Missing or unreadable files
//! fall back to defaults; command-line flags override individual values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use cl2_analyze::AnalyzerConfig;
use cl2_capture::{Parity, SegmenterConfig, SerialSettings};
use cl2_detect::ProbeConfig;
use cl2_protocol::ChecksumKind;
use serde::{Deserialize, Serialize};

/// Persisted defaults for every subcommand
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Serial port of the RS-485 adapter
    pub port: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: u8,
    /// Silence that ends a frame during capture
    pub quiet_interval_ms: u64,
    /// Directory for new capture files
    pub output_dir: PathBuf,
    /// Checksum hypothesis used when decoding
    pub checksum: ChecksumKind,
    /// Listening time per rate when probing baud rates
    pub sample_time_secs: f64,
    /// Mains frequency for EnviraCOM sync checks
    pub ac_frequency: f64,
    /// Logic threshold for analyzer traces
    pub logic_threshold: f64,
    pub top_conversations: usize,
    pub prefix_len: usize,
    pub min_occurrences: usize,
}

impl Default for Settings {
    fn default() -> Self {
        let serial = SerialSettings::default();
        let analyzer = AnalyzerConfig::default();
        Self {
            port: serial.port,
            baud_rate: serial.baud_rate,
            data_bits: serial.data_bits,
            parity: serial.parity,
            stop_bits: serial.stop_bits,
            quiet_interval_ms: 50,
            output_dir: PathBuf::from("./captures/raw"),
            checksum: ChecksumKind::default(),
            sample_time_secs: 3.0,
            ac_frequency: 60.0,
            logic_threshold: 1.5,
            top_conversations: analyzer.top_conversations,
            prefix_len: analyzer.prefix_len,
            min_occurrences: analyzer.min_occurrences,
        }
    }
}

impl Settings {
    /// Get the XDG config directory for cl2-tools
    /// Uses $XDG_CONFIG_HOME/cl2-tools, falls back to ~/.config/cl2-tools
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("cl2-tools"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("cl2-tools"))
    }

    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from disk
    pub fn load() -> Self {
        Self::settings_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Load settings from `path`, defaulting on any problem
    pub fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save settings to disk, returning where they were written
    pub fn save(&self) -> anyhow::Result<PathBuf> {
        let path = Self::settings_path().context("could not determine settings path")?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(self).context("failed to serialize settings")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn serial_settings(&self) -> SerialSettings {
        SerialSettings {
            port: self.port.clone(),
            baud_rate: self.baud_rate,
            data_bits: self.data_bits,
            parity: self.parity,
            stop_bits: self.stop_bits,
        }
    }

    pub fn segmenter_config(&self) -> SegmenterConfig {
        SegmenterConfig::with_quiet_interval(Duration::from_millis(self.quiet_interval_ms))
    }

    pub fn analyzer_config(&self) -> AnalyzerConfig {
        AnalyzerConfig {
            top_conversations: self.top_conversations,
            prefix_len: self.prefix_len,
            min_occurrences: self.min_occurrences,
        }
    }

    pub fn probe_config(&self) -> ProbeConfig {
        let defaults = ProbeConfig::default();
        ProbeConfig {
            sample_window: Duration::try_from_secs_f64(self.sample_time_secs)
                .unwrap_or(defaults.sample_window),
            ..defaults
        }
    }
}
