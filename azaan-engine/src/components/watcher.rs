//! Defines the controllers that react to engine ticks.

use crate::common::{Prayer, TimeOfDay};
use crate::error::RefreshError;
use crate::events::{PrayerEvent, ScheduleEvent};
use crate::playback::Player;
use crate::schedule::{EventTable, LiveSchedule};
use crate::supplier::TimingsSupplier;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashSet;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Plays each prayer once, during the minute it is scheduled for.
///
/// Every prayer is either pending or fired. A prayer moves to fired the first
/// time a tick lands in its minute and never moves back until the next
/// successful daily refresh, so polling as often as you like is safe.
#[derive(Debug, Default)]
pub struct FireController {
    fired: HashSet<Prayer>,
}

impl FireController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fired(&self, prayer: Prayer) -> bool {
        self.fired.contains(&prayer)
    }

    /// Prayers fired today, in display order.
    pub fn fired(&self) -> Vec<Prayer> {
        Prayer::ALL
            .into_iter()
            .filter(|p| self.fired.contains(p))
            .collect()
    }

    /// Puts every prayer back to pending.
    pub(crate) fn reset(&mut self) {
        self.fired.clear();
    }

    /// Fires every pending prayer whose minute matches `now`.
    ///
    /// Due prayers are handled in display order and each playback is awaited
    /// before the next one is considered. A failed playback still marks the
    /// prayer fired. Returns the prayers fired by this tick.
    pub async fn tick(
        &mut self,
        table: &EventTable,
        now: NaiveDateTime,
        player: &dyn Player,
        prayer_event_sender: &broadcast::Sender<PrayerEvent>,
    ) -> Vec<Prayer> {
        let minute = TimeOfDay::from_time(now.time());
        let mut fired_now = Vec::new();

        for (prayer, time) in table.iter() {
            if time != minute || self.fired.contains(&prayer) {
                continue;
            }
            self.fired.insert(prayer);
            fired_now.push(prayer);
            prayer_event_sender
                .send(PrayerEvent::Fired { prayer, at: now })
                .ok();

            match player.play(prayer).await {
                Ok(()) => {
                    prayer_event_sender
                        .send(PrayerEvent::PlaybackCompleted { prayer })
                        .ok();
                }
                Err(e) => {
                    error!("Error playing azaan for {}: {}", prayer, e);
                    prayer_event_sender
                        .send(PrayerEvent::PlaybackFailed {
                            prayer,
                            reason: e.to_string(),
                        })
                        .ok();
                }
            }
        }
        fired_now
    }
}

/// Replaces the schedule once per calendar day.
///
/// The attempt happens on the first tick at or after `refresh_at` on a date
/// later than the last attempt. A failure is not retried until the next day.
#[derive(Debug)]
pub struct DailyRefreshController {
    refresh_at: TimeOfDay,
    last_attempt: Option<NaiveDate>,
}

impl DailyRefreshController {
    /// `fetched_on` is the date of the table the engine starts with, which
    /// counts as that day's refresh.
    pub fn new(refresh_at: TimeOfDay, fetched_on: Option<NaiveDate>) -> Self {
        Self {
            refresh_at,
            last_attempt: fetched_on,
        }
    }

    pub fn last_attempt(&self) -> Option<NaiveDate> {
        self.last_attempt
    }

    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        let past_refresh_time = now.time() >= self.refresh_at.to_naive_time();
        let new_day = self.last_attempt.map_or(true, |last| now.date() > last);
        past_refresh_time && new_day
    }

    /// Refreshes if due; returns `None` when nothing was attempted.
    pub async fn process_tick(
        &mut self,
        now: NaiveDateTime,
        supplier: &dyn TimingsSupplier,
        live: &LiveSchedule,
        fire: &mut FireController,
        schedule_event_sender: &broadcast::Sender<ScheduleEvent>,
    ) -> Option<Result<(), RefreshError>> {
        if !self.is_due(now) {
            return None;
        }
        Some(self.refresh(now, supplier, live, fire, schedule_event_sender).await)
    }

    /// Fetches a new table, then swaps it in and resets `fire`.
    ///
    /// On any failure the live table and the fired set are left exactly as
    /// they were and the schedule is marked stale.
    pub async fn refresh(
        &mut self,
        now: NaiveDateTime,
        supplier: &dyn TimingsSupplier,
        live: &LiveSchedule,
        fire: &mut FireController,
        schedule_event_sender: &broadcast::Sender<ScheduleEvent>,
    ) -> Result<(), RefreshError> {
        self.last_attempt = Some(now.date());
        info!("Fetching new prayer times for {}...", now.date());

        let attempt = async {
            let raw = supplier.fetch().await?;
            Ok::<_, RefreshError>(raw.into_table()?)
        };
        match attempt.await {
            Ok(table) => {
                let date_label = table.date_label().to_string();
                live.replace(table).await;
                fire.reset();
                info!("Prayer times updated for {}.", date_label);
                debug!("All prayers pending again.");
                schedule_event_sender
                    .send(ScheduleEvent::Refreshed { date_label, at: now })
                    .ok();
                Ok(())
            }
            Err(e) => {
                live.mark_stale();
                warn!("Failed to update prayer times, keeping the previous schedule: {}", e);
                schedule_event_sender
                    .send(ScheduleEvent::RefreshFailed {
                        reason: e.to_string(),
                        at: now,
                    })
                    .ok();
                Err(e)
            }
        }
    }
}
