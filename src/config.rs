//! Configuration management for the bridge
//!
//! Runtime configuration is loaded from a JSON file so engine limits and
//! logging can be adjusted without recompiling. Every section falls back to
//! its defaults when missing from the file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Environment variable naming an alternative config file
pub const CONFIG_PATH_ENV: &str = "DTMF_BRIDGE_CONFIG";

/// Default config location for non-embedded hosts
pub const DEFAULT_CONFIG_PATH: &str = "assets/bridge_config.json";

/// Complete bridge configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Max level: "error", "warn", "info", "debug" or "trace"
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// DTMF limits enforced by the media engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Shortest accepted tone duration
    pub min_duration_ms: i32,
    /// Longest accepted tone duration
    pub max_duration_ms: i32,
    /// Shortest accepted gap between tones
    pub min_inter_tone_gap_ms: i32,
    /// Pause inserted for a `,` in the tone string
    pub comma_delay_ms: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_duration_ms: 40,
            max_duration_ms: 6000,
            min_inter_tone_gap_ms: 30,
            comma_delay_ms: 2000,
        }
    }
}

/// Cross-thread dispatcher configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Pending work units above which a warning is logged on drain
    pub queue_warn_depth: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_warn_depth: 256,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from JSON file
    ///
    /// Missing or malformed files are not fatal: a warning is logged and the
    /// defaults are returned.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from `DTMF_BRIDGE_CONFIG` or the default path
    pub fn load() -> Self {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.is_empty() => Self::load_from_file(path),
            _ => Self::load_from_file(DEFAULT_CONFIG_PATH),
        }
    }
}
