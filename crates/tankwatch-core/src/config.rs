//! Engine settings and the `tankwatch.toml` parser.

use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::Deserialize;
use thiserror::Error;

/// Default HTTP port, matching the sensors' firmware.
pub const DEFAULT_PORT: u16 = 8080;

/// Default directory for the redb file.
pub const DEFAULT_DATA_DIR: &str = "/var/lib/tankwatch";

/// Rejected engine settings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("capacity must be positive and finite, got {0}")]
    InvalidCapacity(f64),

    #[error("recent window must be positive, got {0}h")]
    InvalidWindow(f64),

    #[error("{name} must be positive and finite, got {value}")]
    InvalidFloor { name: &'static str, value: f64 },

    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),
}

/// Immutable tunables for the prediction engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Volume of a full container (litres).
    pub capacity: f64,
    /// Readings newer than `now - recent_window_hours` drive the rate.
    pub recent_window_hours: f64,
    /// Lower bound on the consumption rate (litres/hour).
    pub min_rate: f64,
    /// Lower bound on the elapsed time of the rate window (hours).
    pub min_elapsed_hours: f64,
    /// Reference zone all instants are normalized into.
    pub timezone: Tz,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capacity: 19.0,
            recent_window_hours: 48.0,
            min_rate: 0.01,
            min_elapsed_hours: 0.1,
            timezone: chrono_tz::Asia::Jakarta,
        }
    }
}

impl EngineConfig {
    pub fn with_capacity(mut self, capacity: f64) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_recent_window_hours(mut self, hours: f64) -> Self {
        self.recent_window_hours = hours;
        self
    }

    pub fn with_min_rate(mut self, rate: f64) -> Self {
        self.min_rate = rate;
        self
    }

    pub fn with_min_elapsed_hours(mut self, hours: f64) -> Self {
        self.min_elapsed_hours = hours;
        self
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    /// Check that every value is usable by the engine.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.capacity.is_finite() && self.capacity > 0.0) {
            return Err(ConfigError::InvalidCapacity(self.capacity));
        }
        if !(self.recent_window_hours.is_finite() && self.recent_window_hours > 0.0) {
            return Err(ConfigError::InvalidWindow(self.recent_window_hours));
        }
        for (name, value) in [
            ("min_rate", self.min_rate),
            ("min_elapsed_hours", self.min_elapsed_hours),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidFloor { name, value });
            }
        }
        Ok(())
    }
}

// ── tankwatch.toml ────────────────────────────────────────────────

/// On-disk daemon configuration. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TankwatchConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    pub port: Option<u16>,
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineSection {
    pub capacity: Option<f64>,
    pub recent_window_hours: Option<f64>,
    pub min_rate: Option<f64>,
    pub min_elapsed_hours: Option<f64>,
    pub timezone: Option<String>,
}

impl TankwatchConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TankwatchConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn port(&self) -> u16 {
        self.server.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.server
            .data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
    }

    /// Resolve the `[engine]` section over the defaults and validate it.
    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let defaults = EngineConfig::default();
        let section = &self.engine;

        let timezone = match &section.timezone {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|_| ConfigError::UnknownTimezone(name.clone()))?,
            None => defaults.timezone,
        };

        let config = EngineConfig {
            capacity: section.capacity.unwrap_or(defaults.capacity),
            recent_window_hours: section
                .recent_window_hours
                .unwrap_or(defaults.recent_window_hours),
            min_rate: section.min_rate.unwrap_or(defaults.min_rate),
            min_elapsed_hours: section
                .min_elapsed_hours
                .unwrap_or(defaults.min_elapsed_hours),
            timezone,
        };
        config.validate()?;
        Ok(config)
    }
}
