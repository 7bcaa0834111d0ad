//! Defines all public event types broadcast by the Azaan engine.
//!
//! This module acts as the public API for the engine's event system. Listeners
//! subscribe to these specific, strongly-typed streams to log, display or
//! react to what the engine is doing.

use crate::common::Prayer;
use chrono::NaiveDateTime;
use tokio::time::Instant;

/// Events related to the lifecycle of the engine itself.
#[derive(Debug, Clone)]
pub enum SystemEvent {
    /// Fired once when the engine's dispatcher loop begins.
    EngineStarted { timestamp: Instant, simulated: bool },
    /// Fired once when the engine's `run` loop is about to exit.
    EngineShutdown,
}

/// Events related to the daily schedule.
#[derive(Debug, Clone)]
pub enum ScheduleEvent {
    /// A new table was swapped in and every prayer is pending again.
    Refreshed { date_label: String, at: NaiveDateTime },
    /// The refresh attempt failed; the previous table stays in force.
    RefreshFailed { reason: String, at: NaiveDateTime },
}

/// Events related to individual prayers.
#[derive(Debug, Clone)]
pub enum PrayerEvent {
    /// The prayer's minute arrived and playback was started.
    Fired { prayer: Prayer, at: NaiveDateTime },
    /// Playback finished normally.
    PlaybackCompleted { prayer: Prayer },
    /// Playback failed. The prayer still counts as fired for today.
    PlaybackFailed { prayer: Prayer, reason: String },
}
