//! Contains the stateful building blocks driven by the engine's ticks.
//!
//! `FireController` decides which prayers are due and plays them once each,
//! and `DailyRefreshController` replaces the schedule once per calendar day.
//! The `AzaanEngine` owns one of each and feeds them every tick.

pub mod watcher;
