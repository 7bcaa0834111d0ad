//! Error types for each concern of the engine.
//!
//! The engine never panics on bad input from its collaborators: supplier
//! payloads, audio commands and configuration files all surface here.

use crate::common::Prayer;
use thiserror::Error;

/// Problems building or querying an `EventTable`.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("'{0}' is not a valid HH:MM time")]
    InvalidTimeOfDay(String),

    #[error("malformed time for {prayer}: '{value}' is not a valid HH:MM time")]
    MalformedTime { prayer: Prayer, value: String },

    #[error("incomplete schedule: no time supplied for {missing}")]
    IncompleteSchedule { missing: Prayer },

    #[error("schedule has no entries")]
    EmptySchedule,
}

/// Failures of the remote timings supplier.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("timings request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("timings provider answered with status {0}")]
    Status(u16),

    #[error("timings response could not be decoded: {0}")]
    Decode(String),
}

/// Failures of the audio playback action.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("failed to start player '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("player '{command}' exited with {status}")]
    ExitStatus {
        command: String,
        status: std::process::ExitStatus,
    },
}

/// A daily refresh attempt that left the previous schedule in force.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Build(#[from] ScheduleError),
}

/// Configuration that could not be loaded or does not make sense.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
