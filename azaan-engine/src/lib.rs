//! # Azaan
//!
//! A small event-driven engine that plays the call to prayer at each of the
//! five daily prayer times for a fixed location.
//!
//! ## Core Concepts
//!
//! - **ClockSource**: the single source of "now", either the real local clock
//!   or a simulated clock that runs at real speed from a fixed anchor.
//! - **EventTable**: the day's five prayer times, fetched from a
//!   `TimingsSupplier` and replaced whole once per calendar day.
//! - **FireController**: plays each prayer exactly once during its minute,
//!   however often it is ticked.
//! - **DailyRefreshController**: fetches the next day's table shortly after
//!   midnight and resets the fired set.
//! - **Event-Driven**: the engine publishes strongly-typed events
//!   (`SystemEvent`, `ScheduleEvent`, `PrayerEvent`) that the application
//!   subscribes to for logging or display.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use azaan::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // 1. Load the configuration (defaults, azaan.toml, environment).
//!     let config = AzaanConfig::load(None)?;
//!
//!     // 2. Fetch today's schedule.
//!     let supplier = Arc::new(AladhanClient::new(&config.location, &config.supplier));
//!     let table = supplier.fetch().await?.into_table()?;
//!
//!     // 3. Create the engine.
//!     let player = Arc::new(CommandPlayer::new(&config.audio));
//!     let engine = AzaanEngine::new(config, ClockSource::real(), table, supplier, player);
//!
//!     // 4. Subscribe to an event stream before starting the engine.
//!     let mut prayers = engine.subscribe_prayer_events();
//!     tokio::spawn(async move {
//!         while let Ok(event) = prayers.recv().await {
//!             println!("Received Prayer Event: {:?}", event);
//!         }
//!     });
//!
//!     // 5. Run the engine. It will shut down on Ctrl+C.
//!     engine.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub const ENGINE_NAME: &str = "Azaan Engine";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Declare all the modules in the crate.
pub mod common;
pub mod components;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod playback;
pub mod schedule;
pub mod server;
pub mod supplier;
pub mod time;

/// A prelude module for easy importing of the most common Azaan types.
pub mod prelude {
    pub use crate::common::{Prayer, TimeOfDay};
    pub use crate::components::watcher::{DailyRefreshController, FireController};
    pub use crate::config::{AzaanConfig, ClockResolution};
    pub use crate::engine::{AzaanEngine, ScheduleSnapshot};
    pub use crate::events::{PrayerEvent, ScheduleEvent, SystemEvent};
    pub use crate::playback::{CommandPlayer, Player};
    pub use crate::schedule::{resolve_next, EventTable, LiveSchedule, NextPrayer};
    pub use crate::supplier::{AladhanClient, RawTimings, TimingsSupplier};
    pub use crate::time::ClockSource;
}
