//! Defines all configuration structures for the Azaan engine.
//!
//! These structs are deserialized with `serde` through the `config` crate. The
//! layers are, lowest precedence first: built-in defaults, an optional TOML
//! file, and `AZAAN__`-prefixed environment variables (for example
//! `AZAAN__SERVER__PORT=9090`).

use crate::common::TimeOfDay;
use crate::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_NAME: &str = "azaan";

/// The top-level configuration for the `AzaanEngine`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AzaanConfig {
    /// Where prayer times are calculated for.
    pub location: LocationConfig,
    /// The remote timings provider.
    pub supplier: SupplierConfig,
    /// The audio played at each prayer.
    pub audio: AudioConfig,
    /// The query interface.
    pub server: ServerConfig,
    /// Tick speed and daily refresh time.
    pub schedule: ScheduleConfig,
}

/// The fixed location the schedule is fetched for.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// A human-readable name, reported by the query interface.
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// The provider's calculation method identifier (2 is ISNA).
    pub method: u8,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SupplierConfig {
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// The audio file handed to the player. It must exist at startup.
    pub file: PathBuf,
    /// The program that renders the file and blocks until it is done.
    pub command: String,
    /// Extra arguments placed before the file path.
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory served at `/` for the dashboard page.
    pub static_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Local time at which the next day's schedule is fetched. Must fall
    /// within the first hour of the day, ahead of every prayer, because the
    /// refresh is what puts the day's prayers back to pending.
    pub refresh_at: TimeOfDay,
    /// Tick speed under the real clock. The simulated clock always ticks
    /// at `ClockResolution::High`.
    pub resolution: ClockResolution,
}

/// Defines the operational speed of the `SystemClock`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockResolution {
    /// One tick per second. Needed under the simulated clock so a minute
    /// boundary is never skipped.
    High,
    /// One tick per minute. Enough for real operation.
    Low,
    /// A user-defined period in whole seconds.
    Custom { seconds: u64 },
}

impl ClockResolution {
    pub fn period(&self) -> Duration {
        match self {
            ClockResolution::High => Duration::from_secs(1),
            ClockResolution::Low => Duration::from_secs(60),
            ClockResolution::Custom { seconds } => Duration::from_secs(*seconds),
        }
    }
}

impl AzaanConfig {
    /// Loads defaults, then the TOML file, then the environment.
    ///
    /// With `path` the file must exist; without it `azaan.toml` in the working
    /// directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };
        let loaded: AzaanConfig = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("AZAAN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Rejects settings that deserialize cleanly but cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let ClockResolution::Custom { seconds: 0 } = self.schedule.resolution {
            return Err(ConfigError::Invalid(
                "schedule.resolution custom seconds must be greater than zero".into(),
            ));
        }
        if self.schedule.refresh_at.hour() >= 1 {
            return Err(ConfigError::Invalid(format!(
                "schedule.refresh_at {} must be before 01:00",
                self.schedule.refresh_at
            )));
        }
        if !(-90.0..=90.0).contains(&self.location.latitude) {
            return Err(ConfigError::Invalid(format!(
                "location.latitude {} is outside -90..=90",
                self.location.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&self.location.longitude) {
            return Err(ConfigError::Invalid(format!(
                "location.longitude {} is outside -180..=180",
                self.location.longitude
            )));
        }
        if self.audio.command.trim().is_empty() {
            return Err(ConfigError::Invalid("audio.command must not be empty".into()));
        }
        Ok(())
    }
}

// --- Default values ---

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            name: "Princeton, NJ".to_string(),
            latitude: 40.3573,
            longitude: -74.6672,
            method: 2,
        }
    }
}

impl Default for SupplierConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.aladhan.com/v1".to_string(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("azaan.mp3"),
            command: "afplay".to_string(),
            args: Vec::new(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            static_dir: PathBuf::from("web"),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            refresh_at: TimeOfDay::DEFAULT_REFRESH,
            resolution: ClockResolution::Low,
        }
    }
}
