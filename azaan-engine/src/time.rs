//! The engine's sources of time.
//!
//! `ClockSource` answers "what time is it?" for scheduling decisions, either
//! from the operating system or from a fixed simulated anchor. `SystemClock`
//! is the ticker that decides *when* those decisions are evaluated.

use crate::config::ClockResolution;
use chrono::{Local, NaiveDateTime, TimeDelta, Timelike};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, sleep, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info};

/// Supplies "now" as naive local wall-clock time.
///
/// A simulated clock stores the pair captured when it was created and derives
/// every reading from it, so it runs at the same rate as real time and never
/// drifts:
///
/// `now = simulated_start + (real_now - wall_start)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockSource {
    /// The operating system's local time.
    Real,
    /// Real time shifted by a fixed offset.
    Simulated {
        simulated_start: NaiveDateTime,
        wall_start: NaiveDateTime,
    },
}

impl ClockSource {
    pub fn real() -> Self {
        ClockSource::Real
    }

    /// A clock that reads `anchor` right now and advances from there.
    pub fn simulated(anchor: NaiveDateTime) -> Self {
        Self::simulated_from(anchor, Local::now().naive_local())
    }

    /// A clock that read `anchor` at the real instant `wall_start`.
    pub fn simulated_from(anchor: NaiveDateTime, wall_start: NaiveDateTime) -> Self {
        ClockSource::Simulated {
            simulated_start: anchor,
            wall_start,
        }
    }

    /// A clock that reads `target` once `lead` of real time has passed
    /// since `wall_start`. `None` if `lead` reaches outside the calendar.
    pub fn leading_into(target: NaiveDateTime, lead: Duration, wall_start: NaiveDateTime) -> Option<Self> {
        let lead = TimeDelta::from_std(lead).ok()?;
        let anchor = target.checked_sub_signed(lead)?;
        Some(Self::simulated_from(anchor, wall_start))
    }

    pub fn is_simulated(&self) -> bool {
        matches!(self, ClockSource::Simulated { .. })
    }

    pub fn now(&self) -> NaiveDateTime {
        self.at(Local::now().naive_local())
    }

    /// The reading this clock gives when real local time is `real_now`.
    pub fn at(&self, real_now: NaiveDateTime) -> NaiveDateTime {
        match *self {
            ClockSource::Real => real_now,
            ClockSource::Simulated {
                simulated_start,
                wall_start,
            } => simulated_start + (real_now - wall_start),
        }
    }
}

/// One beat of the `SystemClock`.
#[derive(Debug)]
pub struct TickEvent {
    /// Ticks emitted since the clock started, starting at 1.
    pub tick_count: u64,
    pub timestamp: Instant,
}

/// Past the minute boundary so a woken ticker reads the new minute.
const MINUTE_SLACK: Duration = Duration::from_millis(20);

/// Real time left until just after the start of the next minute.
pub(crate) fn until_next_minute(now: NaiveDateTime) -> Duration {
    // Leap seconds report nanoseconds past 1e9; treat them as the last instant.
    let into_minute = Duration::new(now.second() as u64, now.nanosecond().min(999_999_999));
    Duration::from_secs(60) - into_minute + MINUTE_SLACK
}

/// A periodic ticker broadcasting `TickEvent`s until shut down.
///
/// At `ClockResolution::Low` every tick after the first is aligned to the
/// start of a wall-clock minute, so the monotonic timer drifting against
/// local time can never leave a minute without a tick.
pub struct SystemClock {
    resolution: ClockResolution,
    tick_sender: broadcast::Sender<Arc<TickEvent>>,
}

impl SystemClock {
    pub fn new(resolution: ClockResolution, tick_sender: broadcast::Sender<Arc<TickEvent>>) -> Self {
        Self {
            resolution,
            tick_sender,
        }
    }

    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let period = self.resolution.period();
        let mut ticker = interval(period);
        // A long playback stalls the dispatcher, not the clock; catch up
        // in one tick instead of bursting.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let on_the_minute = self.resolution == ClockResolution::Low;
        info!(
            "SystemClock ticking every {:?}{}.",
            period,
            if on_the_minute { " on the minute" } else { "" }
        );

        let mut tick_count: u64 = 0;
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                instant = next_tick(&mut ticker, on_the_minute && tick_count > 0) => {
                    tick_count += 1;
                    let tick = Arc::new(TickEvent { tick_count, timestamp: instant });
                    // No subscribers just means nobody is listening yet.
                    self.tick_sender.send(tick).ok();
                }
            }
        }
        debug!("SystemClock stopped after {} ticks.", tick_count);
    }
}

async fn next_tick(ticker: &mut Interval, on_the_minute: bool) -> Instant {
    if on_the_minute {
        sleep(until_next_minute(Local::now().naive_local())).await;
        Instant::now()
    } else {
        ticker.tick().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn real_clock_passes_time_through() {
        let now = at(9, 41, 0);
        assert_eq!(ClockSource::real().at(now), now);
        assert!(!ClockSource::real().is_simulated());
    }

    #[test]
    fn simulated_clock_is_deterministic_and_advances_one_to_one() {
        let wall_start = at(3, 0, 0);
        let clock = ClockSource::simulated_from(at(18, 19, 50), wall_start);

        assert_eq!(clock.at(wall_start), at(18, 19, 50));
        assert_eq!(clock.at(at(3, 0, 10)), at(18, 20, 0));
        assert_eq!(clock.at(at(3, 0, 10)), clock.at(at(3, 0, 10)));
        assert_eq!(clock.at(at(4, 0, 0)), at(19, 19, 50));
    }

    #[test]
    fn simulated_clock_crosses_midnight() {
        let wall_start = at(12, 0, 0);
        let clock = ClockSource::simulated_from(at(23, 59, 55), wall_start);
        let later = clock.at(at(12, 0, 10));
        assert_eq!(later.date(), NaiveDate::from_ymd_opt(2025, 6, 2).unwrap());
        assert_eq!(later.time(), chrono::NaiveTime::from_hms_opt(0, 0, 5).unwrap());
    }

    #[test]
    fn leading_into_anchors_before_target() {
        let wall_start = at(9, 0, 0);
        let clock = ClockSource::leading_into(at(18, 20, 0), Duration::from_secs(10), wall_start).unwrap();
        assert_eq!(clock.at(wall_start), at(18, 19, 50));
        assert_eq!(clock.at(at(9, 0, 10)), at(18, 20, 0));
    }

    #[test]
    fn leading_into_rejects_unrepresentable_lead() {
        let target = at(18, 20, 0);
        assert!(ClockSource::leading_into(target, Duration::from_secs(u64::MAX), target).is_none());
    }

    #[test]
    fn low_resolution_wakes_just_after_the_minute() {
        assert_eq!(until_next_minute(at(12, 0, 45)), Duration::from_secs(15) + MINUTE_SLACK);
        assert_eq!(until_next_minute(at(12, 0, 0)), Duration::from_secs(60) + MINUTE_SLACK);
        let late = at(12, 0, 59) + TimeDelta::milliseconds(990);
        assert_eq!(until_next_minute(late), Duration::from_millis(10) + MINUTE_SLACK);
    }

    #[tokio::test]
    async fn system_clock_ticks_until_shutdown() {
        let (tick_tx, mut tick_rx) = broadcast::channel(16);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let clock = SystemClock::new(ClockResolution::High, tick_tx);
        let handle = tokio::spawn(clock.run(shutdown_rx));

        let first = tick_rx.recv().await.unwrap();
        let second = tick_rx.recv().await.unwrap();
        assert_eq!((first.tick_count, second.tick_count), (1, 2));

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
