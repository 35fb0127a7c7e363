//! Periodic reset and purge of completed tasks.
//!
//! A run fetches the completed tasks once, clears `completed_at` of daily tasks
//! whose local day has passed, and deletes one-off tasks completed more than a
//! day ago. Runs are not mutually exclusive: both batches are keyed by id and
//! idempotent, so overlapping or repeated runs converge to the same rows.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tasklane_core::{Clock, MaintenanceAction, TaskId, TaskPatch, maintenance_action};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::session::SessionProvider;
use crate::store::{TaskStore, into_anyhow};
use crate::task_list::TaskList;

/// Default time between scheduled runs.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Longest time between scheduled runs; longer intervals are clamped to it.
pub const MAX_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
/// Default minimum spacing between two triggered runs.
pub const DEFAULT_MIN_GAP: Duration = Duration::from_secs(5);

/// Scheduler timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceConfig {
    /// Time between scheduled runs.
    pub interval: Duration,
    /// A trigger arriving sooner than this after the previous run started is skipped.
    pub min_gap: Duration,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            min_gap: DEFAULT_MIN_GAP,
        }
    }
}

/// What caused a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceTrigger {
    /// Process start; never skipped.
    Startup,
    /// Interval timer.
    Tick,
    /// The user came back to the application.
    Foreground,
    /// Explicit request; never skipped.
    Manual,
}

impl MaintenanceTrigger {
    const fn bypasses_gap(self) -> bool {
        matches!(self, Self::Startup | Self::Manual)
    }
}

/// Why a run did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Nobody is signed in.
    SignedOut,
    /// The previous run started less than `min_gap` ago.
    TooSoon,
    /// Completed tasks could not be fetched.
    FetchFailed,
}

/// Outcome of one run. Failures are reported here, never raised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    /// Daily tasks reopened.
    pub reset: usize,
    /// One-off tasks purged.
    pub deleted: usize,
    /// Error of the reset batch.
    pub reset_error: Option<String>,
    /// Error of the delete batch.
    pub delete_error: Option<String>,
    /// Set when the run stopped before evaluating tasks.
    pub skipped: Option<SkipReason>,
}

impl MaintenanceReport {
    const fn skipped(reason: SkipReason) -> Self {
        Self {
            reset: 0,
            deleted: 0,
            reset_error: None,
            delete_error: None,
            skipped: Some(reason),
        }
    }

    /// Whether any row changed.
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.reset > 0 || self.deleted > 0
    }
}

/// Drives the reset/purge rules from a timer and foreground signals.
#[derive(Debug)]
pub struct MaintenanceScheduler<S, P, C> {
    store: S,
    session: P,
    clock: C,
    list: TaskList,
    config: MaintenanceConfig,
    last_run: Mutex<Option<Instant>>,
}

impl<S, P, C> MaintenanceScheduler<S, P, C>
where
    S: TaskStore,
    P: SessionProvider,
    C: Clock,
{
    /// Scheduler refreshing `list` after every successful batch.
    #[must_use]
    pub const fn new(store: S, session: P, clock: C, list: TaskList, config: MaintenanceConfig) -> Self {
        Self {
            store,
            session,
            clock,
            list,
            config,
            last_run: Mutex::new(None),
        }
    }

    /// Timing in effect.
    #[must_use]
    pub const fn config(&self) -> MaintenanceConfig {
        self.config
    }

    /// Run unless the previous run started less than `min_gap` ago.
    ///
    /// Startup and manual triggers always run.
    pub async fn trigger(&self, trigger: MaintenanceTrigger) -> MaintenanceReport {
        {
            let now = Instant::now();
            let mut last = self.last_run.lock().unwrap_or_else(PoisonError::into_inner);
            let recent = last.is_some_and(|at| now.duration_since(at) < self.config.min_gap);
            if recent && !trigger.bypasses_gap() {
                debug!(?trigger, "maintenance skipped, previous run too recent");
                return MaintenanceReport::skipped(SkipReason::TooSoon);
            }
            *last = Some(now);
        }
        self.run_maintenance().await
    }

    /// One reset and purge cycle over the signed-in user's completed tasks.
    #[instrument(skip(self))]
    pub async fn run_maintenance(&self) -> MaintenanceReport {
        let Some(user) = self.session.current_user().await else {
            debug!("maintenance skipped, signed out");
            return MaintenanceReport::skipped(SkipReason::SignedOut);
        };
        let completed = match self.store.list_completed_tasks(user).await {
            Ok(tasks) => tasks,
            Err(err) => {
                warn!(error = %into_anyhow(err), "failed to fetch completed tasks");
                return MaintenanceReport::skipped(SkipReason::FetchFailed);
            }
        };

        let now = self.clock.now();
        let mut to_reset: Vec<TaskId> = Vec::new();
        let mut to_delete: Vec<TaskId> = Vec::new();
        for task in &completed {
            match maintenance_action(task, now, &self.clock) {
                MaintenanceAction::Reset => to_reset.push(task.id),
                MaintenanceAction::Delete => to_delete.push(task.id),
                MaintenanceAction::Keep => {}
            }
        }

        let mut report = MaintenanceReport::default();
        if !to_reset.is_empty() {
            match self.store.update_tasks(&to_reset, &TaskPatch::clear_completion()).await {
                Ok(_) => {
                    report.reset = to_reset.len();
                    info!(count = to_reset.len(), "reset daily tasks");
                    self.refresh(user).await;
                }
                Err(err) => {
                    let err = into_anyhow(err);
                    warn!(error = %err, count = to_reset.len(), "failed to reset daily tasks");
                    report.reset_error = Some(format!("{err:#}"));
                }
            }
        }
        if !to_delete.is_empty() {
            match self.store.delete_tasks(&to_delete).await {
                Ok(_) => {
                    report.deleted = to_delete.len();
                    info!(count = to_delete.len(), "deleted completed tasks");
                    self.refresh(user).await;
                }
                Err(err) => {
                    let err = into_anyhow(err);
                    warn!(error = %err, count = to_delete.len(), "failed to delete completed tasks");
                    report.delete_error = Some(format!("{err:#}"));
                }
            }
        }
        report
    }

    async fn refresh(&self, user: tasklane_core::UserId) {
        if let Err(err) = self.list.refresh(&self.store, user).await {
            warn!(error = %err, "failed to refresh task list after maintenance");
        }
    }
}

impl<S, P, C> MaintenanceScheduler<S, P, C>
where
    S: TaskStore + 'static,
    P: SessionProvider + 'static,
    C: Clock + 'static,
{
    /// Run at startup, then on every interval tick and every trigger received,
    /// until `shutdown` turns true or every trigger sender is dropped.
    ///
    /// Ticks missed while a run is in progress are skipped, not replayed. The
    /// interval is clamped between one second and [`MAX_INTERVAL`].
    pub fn spawn(
        self: Arc<Self>,
        mut triggers: mpsc::Receiver<MaintenanceTrigger>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.trigger(MaintenanceTrigger::Startup).await;
            let period = self.config.interval.clamp(Duration::from_secs(1), MAX_INTERVAL);
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    trigger = triggers.recv() => {
                        let Some(trigger) = trigger else { break };
                        self.trigger(trigger).await;
                    }
                    _ = ticker.tick() => {
                        self.trigger(MaintenanceTrigger::Tick).await;
                    }
                }
            }
            debug!("maintenance scheduler stopped");
        })
    }
}
