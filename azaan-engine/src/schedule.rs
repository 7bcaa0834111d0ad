//! The day's prayer schedule and the "what comes next?" resolver.

use crate::common::{Prayer, TimeOfDay};
use crate::error::ScheduleError;
use chrono::{Days, NaiveDateTime, TimeDelta};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// The five prayer times for one day plus the date they were issued for.
///
/// A table is never edited after it is built. The engine replaces the whole
/// value when the next day's schedule arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTable {
    // Keyed by `Prayer`, so iteration follows display order.
    times: BTreeMap<Prayer, TimeOfDay>,
    date_label: String,
}

impl EventTable {
    /// Builds a table from raw `"HH:MM"` strings.
    ///
    /// Every prayer must be present; the first missing one (in display order)
    /// is reported before any time is parsed.
    pub fn build(
        raw: &HashMap<Prayer, String>,
        date_label: impl Into<String>,
    ) -> Result<Self, ScheduleError> {
        if let Some(&missing) = Prayer::ALL.iter().find(|p| !raw.contains_key(p)) {
            return Err(ScheduleError::IncompleteSchedule { missing });
        }
        let mut times = BTreeMap::new();
        for prayer in Prayer::ALL {
            let value = &raw[&prayer];
            let time = value
                .parse::<TimeOfDay>()
                .map_err(|_| ScheduleError::MalformedTime {
                    prayer,
                    value: value.clone(),
                })?;
            times.insert(prayer, time);
        }
        Ok(Self {
            times,
            date_label: date_label.into(),
        })
    }

    pub fn date_label(&self) -> &str {
        &self.date_label
    }

    pub fn time_of(&self, prayer: Prayer) -> Option<TimeOfDay> {
        self.times.get(&prayer).copied()
    }

    /// Entries in display order.
    pub fn iter(&self) -> impl Iterator<Item = (Prayer, TimeOfDay)> + '_ {
        self.times.iter().map(|(p, t)| (*p, *t))
    }

    #[cfg(test)]
    pub(crate) fn empty(date_label: &str) -> Self {
        Self {
            times: BTreeMap::new(),
            date_label: date_label.to_string(),
        }
    }
}

/// The table currently in force, shared between the dispatcher and readers.
///
/// Only the dispatcher replaces the table, and it does so by swapping the
/// `Arc`. A reader that already cloned the old `Arc` keeps a complete table.
#[derive(Debug)]
pub struct LiveSchedule {
    table: RwLock<Arc<EventTable>>,
    stale: AtomicBool,
}

impl LiveSchedule {
    pub fn new(table: EventTable) -> Self {
        Self {
            table: RwLock::new(Arc::new(table)),
            stale: AtomicBool::new(false),
        }
    }

    pub async fn current(&self) -> Arc<EventTable> {
        self.table.read().await.clone()
    }

    /// Swaps in a freshly built table and clears the stale flag.
    pub(crate) async fn replace(&self, table: EventTable) {
        *self.table.write().await = Arc::new(table);
        self.stale.store(false, Ordering::Release);
    }

    pub(crate) fn mark_stale(&self) {
        self.stale.store(true, Ordering::Release);
    }

    /// Whether the last refresh attempt failed.
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }
}

/// The next prayer after some instant and how long until it starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NextPrayer {
    pub prayer: Prayer,
    pub time: TimeOfDay,
    /// When the prayer starts; tomorrow's date once today's list is exhausted.
    pub at: NaiveDateTime,
    #[serde(skip)]
    pub remaining: TimeDelta,
}

impl NextPrayer {
    /// Whole seconds until the prayer, never negative.
    pub fn countdown_seconds(&self) -> i64 {
        self.remaining.num_seconds().max(0)
    }
}

/// Finds the first prayer strictly later than `now`.
///
/// An entry at exactly `now` counts as passed. Once the last prayer of the
/// day is behind `now`, the first prayer in display order is returned on the
/// following calendar day.
pub fn resolve_next(table: &EventTable, now: NaiveDateTime) -> Result<NextPrayer, ScheduleError> {
    let today = now.date();
    let mut candidates: Vec<(Prayer, TimeOfDay)> = table.iter().collect();
    if candidates.is_empty() {
        return Err(ScheduleError::EmptySchedule);
    }
    // Stable sort: prayers sharing a time stay in display order.
    candidates.sort_by_key(|&(_, time)| time);

    let upcoming = candidates.iter().find_map(|&(prayer, time)| {
        let at = today.and_time(time.to_naive_time());
        (at > now).then_some((prayer, time, at))
    });

    let (prayer, time, at) = match upcoming {
        Some(found) => found,
        None => {
            let (prayer, time) = table.iter().next().ok_or(ScheduleError::EmptySchedule)?;
            let tomorrow = today
                .checked_add_days(Days::new(1))
                .ok_or(ScheduleError::EmptySchedule)?;
            (prayer, time, tomorrow.and_time(time.to_naive_time()))
        }
    };

    Ok(NextPrayer {
        prayer,
        time,
        at,
        remaining: (at - now).max(TimeDelta::zero()),
    })
}
