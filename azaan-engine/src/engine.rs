//! The core engine that orchestrates the entire Azaan system.

use crate::components::watcher::{DailyRefreshController, FireController};
use crate::config::{AzaanConfig, ClockResolution};
use crate::error::ScheduleError;
use crate::events::{PrayerEvent, ScheduleEvent, SystemEvent};
use crate::playback::Player;
use crate::schedule::{resolve_next, EventTable, LiveSchedule, NextPrayer};
use crate::supplier::TimingsSupplier;
use crate::time::{ClockSource, SystemClock, TickEvent};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, trace, warn};

/// The main Azaan engine.
///
/// This struct is the central point of control. It holds the configuration,
/// the clock, the live schedule and the two collaborators (supplier and
/// player), and drives the tick loop. The `Engine` is designed to be cloned
/// and shared across tasks; the query interface holds a clone and only reads.
#[derive(Clone)]
pub struct AzaanEngine {
    config: Arc<AzaanConfig>,
    clock: ClockSource,
    schedule: Arc<LiveSchedule>,
    supplier: Arc<dyn TimingsSupplier>,
    player: Arc<dyn Player>,
    tick_sender: broadcast::Sender<Arc<TickEvent>>,
    system_event_sender: broadcast::Sender<SystemEvent>,
    schedule_event_sender: broadcast::Sender<ScheduleEvent>,
    prayer_event_sender: broadcast::Sender<PrayerEvent>,
}

/// A consistent view of the schedule for readers.
#[derive(Debug, Clone)]
pub struct ScheduleSnapshot {
    pub table: Arc<EventTable>,
    pub next: Result<NextPrayer, Arc<ScheduleError>>,
    /// The last refresh failed and `table` may be out of date.
    pub stale: bool,
}

// Core implementation block for internal logic.
impl AzaanEngine {
    /// Creates a new engine around an already fetched first table.
    pub fn new(
        config: AzaanConfig,
        clock: ClockSource,
        initial: EventTable,
        supplier: Arc<dyn TimingsSupplier>,
        player: Arc<dyn Player>,
    ) -> Self {
        const CHANNEL_CAPACITY: usize = 256;
        let (tick_sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (system_event_sender, _) = broadcast::channel(64);
        let (schedule_event_sender, _) = broadcast::channel(64);
        let (prayer_event_sender, _) = broadcast::channel(64);

        Self {
            config: Arc::new(config),
            clock,
            schedule: Arc::new(LiveSchedule::new(initial)),
            supplier,
            player,
            tick_sender,
            system_event_sender,
            schedule_event_sender,
            prayer_event_sender,
        }
    }

    /// Runs the engine until Ctrl+C.
    pub async fn run(&self) -> anyhow::Result<()> {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
        };
        self.run_until(ctrl_c).await
    }

    /// Runs the engine's main loop until `shutdown` completes.
    ///
    /// This method will:
    /// 1. Spawn the `SystemClock` task.
    /// 2. Spawn the dispatcher task that refreshes and fires on every tick.
    /// 3. Wait for `shutdown`, then stop both tasks.
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) -> anyhow::Result<()> {
        info!("AzaanEngine starting up...");
        let (shutdown_tx, _) = broadcast::channel(1);

        // Subscribe before the clock starts so its first tick is not lost.
        let tick_rx = self.tick_sender.subscribe();
        let resolution = self.resolution();
        let clock = SystemClock::new(resolution.clone(), self.tick_sender.clone());
        let clock_shutdown_rx = shutdown_tx.subscribe();
        let clock_task = tokio::spawn(async move { clock.run(clock_shutdown_rx).await });

        let dispatcher = self.clone();
        let dispatcher_shutdown_rx = shutdown_tx.subscribe();
        let dispatcher_task =
            tokio::spawn(async move { dispatcher.dispatcher_loop(tick_rx, dispatcher_shutdown_rx).await });

        info!(
            "Engine running at {:?} ({} clock).",
            resolution,
            if self.clock.is_simulated() { "simulated" } else { "real" }
        );
        shutdown.await;

        info!("Shutdown signal received. Broadcasting to all tasks...");
        if shutdown_tx.send(()).is_err() {
            error!("Failed to send shutdown signal. Some tasks may not terminate gracefully.");
        }
        // An in-flight playback is not cancelled; give the tasks a moment.
        let grace = Duration::from_millis(50);
        for task in [clock_task, dispatcher_task] {
            if tokio::time::timeout(grace, task).await.is_err() {
                warn!("A task did not stop within {:?}.", grace);
            }
        }
        self.system_event_sender
            .send(SystemEvent::EngineShutdown)
            .ok();
        info!("AzaanEngine has shut down.");
        Ok(())
    }

    /// The simulated clock always needs per-second ticks.
    fn resolution(&self) -> ClockResolution {
        if self.clock.is_simulated() {
            ClockResolution::High
        } else {
            self.config.schedule.resolution.clone()
        }
    }

    #[doc(hidden)]
    async fn dispatcher_loop(
        self,
        mut tick_rx: broadcast::Receiver<Arc<TickEvent>>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        // This loop is the only writer of the fired set and the live table.
        let mut fire = FireController::new();
        let mut refresh = DailyRefreshController::new(
            self.config.schedule.refresh_at,
            Some(self.clock.now().date()),
        );
        self.system_event_sender
            .send(SystemEvent::EngineStarted {
                timestamp: tokio::time::Instant::now(),
                simulated: self.clock.is_simulated(),
            })
            .ok();
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                tick = tick_rx.recv() => match tick {
                    Ok(tick) => {
                        trace!("Tick #{} received.", tick.tick_count);
                        self.process_tick(&mut fire, &mut refresh).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Dispatcher fell behind by {} ticks.", skipped);
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    }

    #[doc(hidden)]
    async fn process_tick(&self, fire: &mut FireController, refresh: &mut DailyRefreshController) {
        let now = self.clock.now();
        // Refresh first so a new day starts with every prayer pending.
        refresh
            .process_tick(
                now,
                self.supplier.as_ref(),
                &self.schedule,
                fire,
                &self.schedule_event_sender,
            )
            .await;
        let table = self.schedule.current().await;
        fire.tick(&table, now, self.player.as_ref(), &self.prayer_event_sender)
            .await;
    }
}

// Public API implementation block.
impl AzaanEngine {
    pub fn config(&self) -> &AzaanConfig {
        &self.config
    }

    pub fn clock(&self) -> ClockSource {
        self.clock
    }

    /// The shared live schedule. Readers only.
    pub fn schedule(&self) -> Arc<LiveSchedule> {
        self.schedule.clone()
    }

    /// The next prayer according to the engine's clock.
    pub async fn next_prayer(&self) -> Result<NextPrayer, ScheduleError> {
        let table = self.schedule.current().await;
        resolve_next(&table, self.clock.now())
    }

    /// The current table, the next prayer and the staleness flag, all read
    /// against the same table.
    pub async fn snapshot(&self) -> ScheduleSnapshot {
        let table = self.schedule.current().await;
        let next = resolve_next(&table, self.clock.now()).map_err(Arc::new);
        ScheduleSnapshot {
            table,
            next,
            stale: self.schedule.is_stale(),
        }
    }

    /// Subscribes to the raw `TickEvent` stream.
    pub fn subscribe_tick_events(&self) -> broadcast::Receiver<Arc<TickEvent>> {
        self.tick_sender.subscribe()
    }

    /// Subscribes to the `SystemEvent` stream.
    pub fn subscribe_system_events(&self) -> broadcast::Receiver<SystemEvent> {
        self.system_event_sender.subscribe()
    }

    /// Subscribes to the `ScheduleEvent` stream.
    pub fn subscribe_schedule_events(&self) -> broadcast::Receiver<ScheduleEvent> {
        self.schedule_event_sender.subscribe()
    }

    /// Subscribes to the `PrayerEvent` stream.
    pub fn subscribe_prayer_events(&self) -> broadcast::Receiver<PrayerEvent> {
        self.prayer_event_sender.subscribe()
    }
}
