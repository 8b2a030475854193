//! Configuration for blechat.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $BLECHAT_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/blechat/config.toml
//!   3. ~/.config/blechat/config.toml
//!
//! The file only seeds startup values. At runtime the settings are changed
//! with slash commands and are never written back.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::command::{parse_manufacturer_code, private_code};
use crate::wire::DEFAULT_MANUFACTURER_CODE;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BlechatConfig {
    pub radio: RadioConfig,
    pub chat: ChatConfig,
    pub timing: TimingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    /// HCI device index (0 = hci0).
    pub device: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Passphrase hashed into the private code. Empty = code 0.
    pub private_phrase: String,
    /// Manufacturer code, 4 hex digits.
    pub manufacturer_code: String,
    /// Relay packets heard from others.
    pub mesh: bool,
    /// 0 = silent, 1 = info, 2 = verbose.
    pub debug: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Broadcast slot held by a self-originated packet.
    pub local_hold_ms: u64,
    /// Broadcast slot held by a relayed packet.
    pub relay_hold_ms: u64,
    /// Quiet period when there is nothing to send.
    pub idle_ms: u64,
    /// Upper bound of the random offset added to every re-arm.
    pub jitter_ms: u64,
    /// Longest the event loop sleeps without checking the clock.
    pub poll_ms: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            private_phrase: String::new(),
            manufacturer_code: format!("{DEFAULT_MANUFACTURER_CODE:04X}"),
            mesh: false,
            debug: 0,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            local_hold_ms: 3000,
            relay_hold_ms: 2000,
            idle_ms: 1000,
            jitter_ms: 250,
            poll_ms: 200,
        }
    }
}

impl TimingConfig {
    pub fn local_hold(&self) -> Duration {
        Duration::from_millis(self.local_hold_ms)
    }

    pub fn relay_hold(&self) -> Duration {
        Duration::from_millis(self.relay_hold_ms)
    }

    pub fn idle(&self) -> Duration {
        Duration::from_millis(self.idle_ms)
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_millis(self.jitter_ms)
    }

    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }
}

// ── Runtime settings ──────────────────────────────────────────────────────────

/// Verbosity of operator-facing diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugLevel {
    #[default]
    Silent,
    Info,
    Verbose,
}

impl DebugLevel {
    /// 0 silent, 1 info, anything larger verbose.
    pub fn from_digit(digit: u8) -> Self {
        match digit {
            0 => DebugLevel::Silent,
            1 => DebugLevel::Info,
            _ => DebugLevel::Verbose,
        }
    }

    pub fn as_digit(self) -> u8 {
        self as u8
    }

    /// Log filter directive for this level.
    pub fn filter_directive(self) -> &'static str {
        match self {
            DebugLevel::Silent => "warn",
            DebugLevel::Info => "info",
            DebugLevel::Verbose => "debug",
        }
    }
}

/// Settings the chat commands can change while running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub private_code: u8,
    pub debug: DebugLevel,
    pub mesh: bool,
    pub manufacturer_code: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            private_code: 0,
            debug: DebugLevel::Silent,
            mesh: false,
            manufacturer_code: DEFAULT_MANUFACTURER_CODE,
        }
    }
}

impl From<&ChatConfig> for Settings {
    fn from(chat: &ChatConfig) -> Self {
        Self {
            private_code: private_code(Some(chat.private_phrase.as_bytes())),
            debug: DebugLevel::from_digit(chat.debug),
            mesh: chat.mesh,
            manufacturer_code: parse_manufacturer_code(chat.manufacturer_code.as_bytes()),
        }
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "privcode {:02X} debugmode {} meshmode {} mfgcode {:04X}",
            self.private_code,
            self.debug.as_digit(),
            u8::from(self.mesh),
            self.manufacturer_code
        )
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("blechat")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl BlechatConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            Self::from_toml(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            BlechatConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("BLECHAT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&BlechatConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply BLECHAT_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("BLECHAT_RADIO__DEVICE") {
            if let Ok(d) = v.parse() {
                self.radio.device = d;
            }
        }
        if let Ok(v) = std::env::var("BLECHAT_CHAT__PRIVATE_PHRASE") {
            self.chat.private_phrase = v;
        }
        if let Ok(v) = std::env::var("BLECHAT_CHAT__MANUFACTURER_CODE") {
            self.chat.manufacturer_code = v;
        }
        if let Ok(v) = std::env::var("BLECHAT_CHAT__MESH") {
            self.chat.mesh = v == "true" || v == "1";
        }
        if let Ok(v) = std::env::var("BLECHAT_CHAT__DEBUG") {
            if let Ok(d) = v.parse() {
                self.chat.debug = d;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::crc8;

    #[test]
    fn default_settings_match_the_protocol_defaults() {
        let settings = Settings::from(&BlechatConfig::default().chat);
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.manufacturer_code, 0x1122);
    }

    #[test]
    fn status_line_format() {
        let settings = Settings {
            private_code: 0x0A,
            debug: DebugLevel::Info,
            mesh: true,
            manufacturer_code: 0x1122,
        };
        assert_eq!(
            settings.to_string(),
            "privcode 0A debugmode 1 meshmode 1 mfgcode 1122"
        );
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = BlechatConfig::from_toml(
            r#"
            [chat]
            private_phrase = "ABC"
            mesh = true
            "#,
        )
        .unwrap();
        assert_eq!(config.timing.local_hold_ms, 3000);
        let settings = Settings::from(&config.chat);
        assert_eq!(settings.private_code, crc8(b"ABC"));
        assert!(settings.mesh);
        assert_eq!(settings.manufacturer_code, 0x1122);
    }

    #[test]
    fn debug_levels_map_to_filters() {
        assert_eq!(DebugLevel::from_digit(0).filter_directive(), "warn");
        assert_eq!(DebugLevel::from_digit(1).filter_directive(), "info");
        assert_eq!(DebugLevel::from_digit(7).filter_directive(), "debug");
    }

    #[test]
    fn write_default_if_missing_creates_file() {
        let tmp = std::env::temp_dir().join(format!("blechat-config-test-{}", std::process::id()));
        let config_path = tmp.join("config.toml");
        std::fs::create_dir_all(&tmp).unwrap();

        unsafe {
            std::env::set_var("BLECHAT_CONFIG", config_path.to_str().unwrap());
        }

        let path = BlechatConfig::write_default_if_missing().expect("write_default_if_missing failed");
        assert!(path.exists());

        let config = BlechatConfig::load().expect("load should succeed");
        assert_eq!(config.timing.relay_hold_ms, 2000);
        assert_eq!(config.chat.manufacturer_code, "1122");

        unsafe {
            std::env::remove_var("BLECHAT_CONFIG");
        }
        let _ = std::fs::remove_dir_all(&tmp);
    }
}
