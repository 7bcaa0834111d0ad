use async_trait::async_trait;
use azaan::error::{FetchError, PlaybackError};
use azaan::prelude::*;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct RecordingPlayer {
    played: Mutex<Vec<Prayer>>,
}

#[async_trait]
impl Player for RecordingPlayer {
    async fn play(&self, prayer: Prayer) -> Result<(), PlaybackError> {
        self.played.lock().unwrap().push(prayer);
        Ok(())
    }
}

struct ScriptedSupplier {
    answers: Mutex<VecDeque<Result<RawTimings, FetchError>>>,
}

#[async_trait]
impl TimingsSupplier for ScriptedSupplier {
    async fn fetch(&self) -> Result<RawTimings, FetchError> {
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(FetchError::Status(503)))
    }
}

fn raw(times: [&str; 5], label: &str) -> RawTimings {
    RawTimings {
        times: Prayer::ALL
            .into_iter()
            .zip(times)
            .map(|(p, t)| (p, t.to_string()))
            .collect(),
        date_label: label.to_string(),
    }
}

fn at(day: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, day)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

fn build_engine(
    config: AzaanConfig,
    anchor: NaiveDateTime,
    table: EventTable,
    answers: Vec<Result<RawTimings, FetchError>>,
) -> (AzaanEngine, Arc<RecordingPlayer>) {
    let player = Arc::new(RecordingPlayer::default());
    let supplier = Arc::new(ScriptedSupplier {
        answers: Mutex::new(answers.into()),
    });
    let engine = AzaanEngine::new(
        config,
        ClockSource::simulated(anchor),
        table,
        supplier,
        player.clone(),
    );
    (engine, player)
}

#[tokio::test]
async fn maghrib_fires_once_when_the_simulated_clock_reaches_it() {
    let table = raw(["05:30", "12:15", "15:45", "18:20", "19:45"], "01 Jun 2025")
        .into_table()
        .unwrap();
    let (engine, player) = build_engine(AzaanConfig::default(), at(1, 18, 19, 58), table, vec![]);
    let mut prayer_rx = engine.subscribe_prayer_events();

    engine
        .run_until(tokio::time::sleep(Duration::from_millis(4500)))
        .await
        .unwrap();

    assert_eq!(*player.played.lock().unwrap(), vec![Prayer::Maghrib]);
    assert!(matches!(
        prayer_rx.try_recv(),
        Ok(PrayerEvent::Fired { prayer: Prayer::Maghrib, .. })
    ));

    // Past Maghrib the countdown has moved on to Isha.
    let next = engine.next_prayer().await.unwrap();
    assert_eq!(next.prayer, Prayer::Isha);
}

#[tokio::test]
async fn midnight_refresh_swaps_the_table_and_rearms_every_prayer() {
    let mut config = AzaanConfig::default();
    config.schedule.refresh_at = "00:00".parse().unwrap();
    // Isha is due as the engine starts; the new day's Fajr at the refresh minute.
    let today = raw(["05:30", "12:15", "15:45", "18:20", "23:59"], "01 Jun 2025")
        .into_table()
        .unwrap();
    let tomorrow = raw(["00:00", "12:15", "15:45", "18:20", "23:59"], "02 Jun 2025");
    let (engine, player) = build_engine(config, at(1, 23, 59, 58), today, vec![Ok(tomorrow)]);
    let mut schedule_rx = engine.subscribe_schedule_events();

    engine
        .run_until(tokio::time::sleep(Duration::from_millis(3500)))
        .await
        .unwrap();

    assert_eq!(*player.played.lock().unwrap(), vec![Prayer::Isha, Prayer::Fajr]);
    assert!(matches!(
        schedule_rx.try_recv(),
        Ok(ScheduleEvent::Refreshed { ref date_label, .. }) if date_label == "02 Jun 2025"
    ));
    let snapshot = engine.snapshot().await;
    assert_eq!(snapshot.table.date_label(), "02 Jun 2025");
    assert!(!snapshot.stale);
}

#[tokio::test]
async fn failed_refresh_keeps_serving_the_old_table_as_stale() {
    let mut config = AzaanConfig::default();
    config.schedule.refresh_at = "00:00".parse().unwrap();
    let today = raw(["05:30", "12:15", "15:45", "18:20", "19:45"], "01 Jun 2025")
        .into_table()
        .unwrap();
    let (engine, player) = build_engine(
        config,
        at(1, 23, 59, 59),
        today.clone(),
        vec![Err(FetchError::Status(502))],
    );
    let mut schedule_rx = engine.subscribe_schedule_events();

    engine
        .run_until(tokio::time::sleep(Duration::from_millis(2500)))
        .await
        .unwrap();

    assert!(matches!(schedule_rx.try_recv(), Ok(ScheduleEvent::RefreshFailed { .. })));
    // Exactly one attempt for the day.
    assert!(schedule_rx.try_recv().is_err());

    let snapshot = engine.snapshot().await;
    assert_eq!(*snapshot.table, today);
    assert!(snapshot.stale);
    assert_eq!(snapshot.next.unwrap().prayer, Prayer::Fajr);
    assert!(player.played.lock().unwrap().is_empty());
}
