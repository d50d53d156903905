//! The recurring polling trigger.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;

use jarvis_core::Coordinator;
use jarvis_core::config::WatchConfig;
use jarvis_core::window::{STARTUP_LOOKBACK_SECS, TimeWindow};

/// Window boundaries for consecutive ticks.
///
/// The first tick looks back [`STARTUP_LOOKBACK_SECS`]; every later tick
/// starts where the previous one started, so no gap opens when a run takes
/// longer than the interval. A fixed lookback disables the chaining.
#[derive(Debug, Clone)]
pub struct WindowCursor {
    fixed_lookback: Option<u64>,
    previous: Option<DateTime<Utc>>,
}

impl WindowCursor {
    pub fn new(fixed_lookback: Option<u64>) -> Self {
        Self {
            fixed_lookback,
            previous: None,
        }
    }

    pub fn next(&mut self, now: DateTime<Utc>) -> TimeWindow {
        let window = match (self.fixed_lookback, self.previous) {
            (Some(secs), _) => TimeWindow::lookback(now, secs),
            (None, Some(previous)) => TimeWindow::since(previous),
            (None, None) => TimeWindow::lookback(now, STARTUP_LOOKBACK_SECS),
        };
        self.previous = Some(now);
        window
    }
}

/// Poll every `check_interval_secs` until `shutdown` resolves. Runs never
/// overlap: a tick that falls due during a run is delayed. Returns the
/// number of completed runs.
pub async fn run_watch<F>(
    coordinator: &Coordinator,
    config: &WatchConfig,
    fixed_lookback: Option<u64>,
    shutdown: F,
) -> u64
where
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(Duration::from_secs(config.check_interval_secs.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut cursor = WindowCursor::new(fixed_lookback);
    let mut runs = 0;

    tracing::info!(
        interval_secs = config.check_interval_secs,
        repositories = config.repositories.len(),
        "Watching repositories"
    );

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            () = &mut shutdown => {
                tracing::info!(runs, "Watcher stopping");
                break;
            }
            _ = ticker.tick() => {
                let window = cursor.next(Utc::now());
                coordinator.run_window(config, &window).await;
                runs += 1;
            }
        }
    }
    runs
}
