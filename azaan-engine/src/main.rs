use anyhow::{bail, Context, Result};
use azaan::prelude::*;
use azaan::{server, ENGINE_NAME, VERSION};
use chrono::{Local, NaiveDateTime};
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Plays the azaan at each of the five daily prayer times.
#[derive(Debug, Parser)]
#[command(name = "azaand", version, about)]
struct Args {
    /// Configuration file (defaults to ./azaan.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pretend the current time is HH:MM today, for testing.
    #[arg(long, value_name = "HH:MM", conflicts_with = "test_in")]
    mock_time: Option<TimeOfDay>,

    /// Trigger the next prayer's azaan in this many seconds, for testing.
    #[arg(long, value_name = "SECONDS")]
    test_in: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    print_banner();

    // 2. Load and check the configuration.
    let config = AzaanConfig::load(args.config.as_deref())?;
    if !config.audio.file.exists() {
        bail!("Audio file {} not found", config.audio.file.display());
    }
    info!("Location: {}", config.location.name);

    // 3. Fetch today's schedule. Without one there is nothing to run.
    let supplier = Arc::new(AladhanClient::new(&config.location, &config.supplier));
    let table = supplier
        .fetch()
        .await
        .context("Failed to fetch prayer times")?
        .into_table()
        .context("Prayer times response was unusable")?;
    print_schedule(&config, &table);

    // 4. Pick the clock.
    let clock = choose_clock(&args, &table, Local::now().naive_local())?;

    // 5. Create the engine and its listeners.
    let player = Arc::new(CommandPlayer::new(&config.audio));
    let engine = AzaanEngine::new(config, clock, table, supplier, player);
    spawn_event_listeners(&engine);

    match engine.next_prayer().await {
        Ok(next) => info!("Next: {} at {}", next.prayer, next.time),
        Err(e) => warn!("Could not resolve the next prayer: {}", e),
    }

    // 6. Serve queries alongside the engine.
    let server_engine = engine.clone();
    let server_task = tokio::spawn(async move {
        if let Err(e) = server::serve(server_engine).await {
            error!("Web server stopped with an error: {}", e);
        }
    });

    info!("{} is running. Press Ctrl+C to stop. Waiting for prayer times...", ENGINE_NAME);
    engine.run().await?;

    if tokio::time::timeout(Duration::from_secs(2), server_task).await.is_err() {
        warn!("Web server did not stop in time.");
    }
    Ok(())
}

fn print_banner() {
    println!("{}", format!("{} v{}", ENGINE_NAME, VERSION).cyan().bold());
    println!("{}", "-".repeat(48).dimmed());
}

fn print_schedule(config: &AzaanConfig, table: &EventTable) {
    println!(
        "{} {} ({})",
        "Prayer times for".bold(),
        config.location.name,
        table.date_label()
    );
    for (prayer, time) in table.iter() {
        println!("  {:<8} {}", prayer.to_string().yellow(), time);
    }
}

/// The real clock unless `--mock-time` or `--test-in` asks for a simulated one.
///
/// `real_now` is the local time the simulated clock starts from.
fn choose_clock(args: &Args, table: &EventTable, real_now: NaiveDateTime) -> Result<ClockSource> {
    if let Some(mock) = args.mock_time {
        let anchor = real_now.date().and_time(mock.to_naive_time());
        info!("{} starting with time {}", "MOCK MODE:".magenta().bold(), mock);
        return Ok(ClockSource::simulated_from(anchor, real_now));
    }
    if let Some(seconds) = args.test_in {
        let next = resolve_next(table, real_now).context("Could not determine next prayer time")?;
        let clock = ClockSource::leading_into(next.at, Duration::from_secs(seconds), real_now)
            .with_context(|| format!("--test-in {} seconds is out of range", seconds))?;
        info!("Test mode: next prayer {} at {}", next.prayer, next.time);
        info!(
            "Mock time set to {}; {} azaan will trigger in {} seconds",
            clock.at(real_now).format("%H:%M:%S"),
            next.prayer,
            seconds
        );
        return Ok(clock);
    }
    Ok(ClockSource::real())
}

/// Spawns one task per event stream, each logging what it receives.
fn spawn_event_listeners(engine: &AzaanEngine) {
    let mut system_rx = engine.subscribe_system_events();
    tokio::spawn(async move {
        while let Ok(event) = system_rx.recv().await {
            info!("[SYSTEM] => {:?}", event);
        }
    });

    let mut schedule_rx = engine.subscribe_schedule_events();
    tokio::spawn(async move {
        while let Ok(event) = schedule_rx.recv().await {
            match event {
                ScheduleEvent::Refreshed { date_label, .. } => {
                    info!("[SCHEDULE] => Prayer times updated and rescheduled for {}.", date_label)
                }
                ScheduleEvent::RefreshFailed { reason, .. } => {
                    warn!("[SCHEDULE] => Failed to update prayer times: {}", reason)
                }
            }
        }
    });

    let mut prayer_rx = engine.subscribe_prayer_events();
    tokio::spawn(async move {
        while let Ok(event) = prayer_rx.recv().await {
            match event {
                PrayerEvent::Fired { prayer, at } => {
                    info!("[PRAYER] => {} at {}", prayer, at.format("%H:%M:%S"))
                }
                PrayerEvent::PlaybackCompleted { prayer } => {
                    info!("[PRAYER] => {} azaan completed.", prayer)
                }
                PrayerEvent::PlaybackFailed { prayer, reason } => {
                    warn!("[PRAYER] => {} azaan failed: {}", prayer, reason)
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    fn table() -> EventTable {
        let times: HashMap<Prayer, String> = Prayer::ALL
            .into_iter()
            .zip(["05:30", "12:15", "15:45", "18:20", "19:45"])
            .map(|(p, t)| (p, t.to_string()))
            .collect();
        EventTable::build(&times, "01 Jun 2025").unwrap()
    }

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn args(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("azaand").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn mock_time_and_test_in_conflict() {
        let parsed = Args::try_parse_from(["azaand", "--mock-time", "14:30", "--test-in", "10"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn mock_time_must_be_hh_mm() {
        assert!(Args::try_parse_from(["azaand", "--mock-time", "2pm"]).is_err());
        let args = Args::try_parse_from(["azaand", "--mock-time", "14:30"]).unwrap();
        assert_eq!(args.mock_time, TimeOfDay::new(14, 30));
    }

    #[test]
    fn test_in_leads_into_the_next_prayer() {
        let clock = choose_clock(&args(&["--test-in", "10"]), &table(), noon()).unwrap();
        assert!(clock.is_simulated());
        let dhuhr = noon().date().and_hms_opt(12, 15, 0).unwrap();
        assert_eq!(clock.at(noon()), dhuhr - chrono::TimeDelta::seconds(10));
    }

    #[test]
    fn test_in_out_of_range_is_rejected() {
        let huge = u64::MAX.to_string();
        assert!(choose_clock(&args(&["--test-in", &huge]), &table(), noon()).is_err());
    }

    #[test]
    fn mock_time_starts_today_at_the_given_minute() {
        let clock = choose_clock(&args(&["--mock-time", "18:19"]), &table(), noon()).unwrap();
        assert_eq!(clock.at(noon()), noon().date().and_hms_opt(18, 19, 0).unwrap());
    }

    #[test]
    fn no_override_uses_the_real_clock() {
        let clock = choose_clock(&args(&[]), &table(), noon()).unwrap();
        assert!(!clock.is_simulated());
    }
}
