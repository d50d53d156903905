use chrono::{DateTime, TimeDelta, Utc};

use crate::config::RepositoryConfig;
use crate::raw::RawWorkflowRun;

/// Initial lookback of a long-running watcher's first tick.
pub const STARTUP_LOOKBACK_SECS: u64 = 60;

/// Lookback for a one-minute cron trigger: the cadence plus a 10s buffer.
pub const CRON_LOOKBACK_SECS: u64 = 70;

/// Lookback for a five-minute scheduled CI check, with buffer. Also the
/// fallback when no previous successful run can be found.
pub const SCHEDULED_LOOKBACK_SECS: u64 = 10 * 60;

/// Exclusive lower bound of "new": an item is new iff its timestamp is
/// strictly after `since`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    since: DateTime<Utc>,
}

impl TimeWindow {
    pub fn since(since: DateTime<Utc>) -> Self {
        Self { since }
    }

    /// `now - lookback_secs`, saturating at the earliest representable time.
    pub fn lookback(now: DateTime<Utc>, lookback_secs: u64) -> Self {
        let since = i64::try_from(lookback_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|delta| now.checked_sub_signed(delta))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self { since }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.since
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp > self.since
    }
}

/// How a polling run derives its [`TimeWindow`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowSpec {
    /// `now - seconds`.
    Lookback(u64),
    /// An absolute boundary supplied by the caller.
    Since(DateTime<Utc>),
    /// Completion time of the newest successful run of the notifier's own
    /// workflow, so consecutive windows stay contiguous. Falls back to
    /// `fallback_secs` of lookback when no such run is found.
    LastSuccessfulRun {
        owner: String,
        repo: String,
        workflow: String,
        fallback_secs: u64,
    },
}

/// Keep the items that are new relative to `window`, preserving order.
///
/// `timestamp` yields the instant that decides recency; `terminal` rejects
/// items that are not finished yet (in-progress workflow runs), regardless of
/// their timestamp.
pub fn select_new<T, I, F, C>(items: I, window: &TimeWindow, timestamp: F, terminal: C) -> Vec<T>
where
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> DateTime<Utc>,
    C: Fn(&T) -> bool,
{
    items
        .into_iter()
        .filter(|item| terminal(item) && window.contains(timestamp(item)))
        .collect()
}

/// Completed runs updated inside `window`.
pub fn select_completed_runs(runs: Vec<RawWorkflowRun>, window: &TimeWindow) -> Vec<RawWorkflowRun> {
    select_new(runs, window, |run| run.updated_at, RawWorkflowRun::is_terminal)
}

/// Drop runs whose workflow name the repository does not list.
pub fn filter_workflows(runs: Vec<RawWorkflowRun>, repo: &RepositoryConfig) -> Vec<RawWorkflowRun> {
    runs.into_iter()
        .filter(|run| repo.wants_workflow(run.workflow_name()))
        .collect()
}
