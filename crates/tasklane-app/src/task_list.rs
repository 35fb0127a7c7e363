//! Last server-confirmed task list shared by the services.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use tasklane_core::ordering::apply_updates;
use tasklane_core::{Category, ReorderUpdate, Task, UserId};
use tokio::sync::watch;
use tracing::debug;

use crate::store::{TaskStore, into_anyhow};

/// Tasks and categories as last confirmed by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Tasks with their joins.
    pub tasks: Vec<Task>,
    /// Categories in creation order.
    pub categories: Vec<Category>,
    /// Increases with every change.
    pub revision: u64,
}

#[derive(Debug, Default)]
struct State {
    snapshot: Snapshot,
    // Ticket of the newest refresh requested and of the newest one installed.
    requested: u64,
    installed: u64,
}

/// Cloneable handle to the confirmed task list.
///
/// Subscribers are woken with the new revision on every change.
#[derive(Debug, Clone)]
pub struct TaskList {
    state: Arc<Mutex<State>>,
    changes: Arc<watch::Sender<u64>>,
}

impl Default for TaskList {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskList {
    /// Empty list at revision 0.
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            state: Arc::new(Mutex::new(State::default())),
            changes: Arc::new(changes),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the confirmed list.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.lock().snapshot.clone()
    }

    /// Current revision.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.lock().snapshot.revision
    }

    /// Receiver woken on every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    fn bump(&self, state: &mut State) -> u64 {
        state.snapshot.revision += 1;
        let revision = state.snapshot.revision;
        self.changes.send_replace(revision);
        revision
    }

    /// Install a freshly loaded list.
    #[allow(clippy::must_use_candidate)]
    pub fn replace(&self, tasks: Vec<Task>, categories: Vec<Category>) -> u64 {
        let mut state = self.lock();
        state.snapshot.tasks = tasks;
        state.snapshot.categories = categories;
        self.bump(&mut state)
    }

    /// Record a reorder batch the store accepted.
    #[allow(clippy::must_use_candidate)]
    pub fn apply_confirmed(&self, updates: &[ReorderUpdate]) -> u64 {
        let mut state = self.lock();
        let Snapshot { tasks, categories, .. } = &mut state.snapshot;
        apply_updates(tasks, updates, categories);
        self.bump(&mut state)
    }

    /// Reload tasks and categories of `user` from `store`.
    ///
    /// When refreshes overlap, a response older than one already installed is
    /// discarded. Returns the revision after the call.
    ///
    /// # Errors
    /// Returns the store error; the confirmed list is left unchanged.
    pub async fn refresh<S: TaskStore>(&self, store: &S, user: UserId) -> Result<u64> {
        let ticket = {
            let mut state = self.lock();
            state.requested += 1;
            state.requested
        };
        let tasks = store
            .list_tasks(user)
            .await
            .map_err(into_anyhow)
            .context("failed to load tasks")?;
        let categories = store
            .list_categories(user)
            .await
            .map_err(into_anyhow)
            .context("failed to load categories")?;

        let mut state = self.lock();
        if ticket < state.installed {
            debug!(ticket, installed = state.installed, "discarding stale refresh");
            return Ok(state.snapshot.revision);
        }
        state.installed = ticket;
        state.snapshot.tasks = tasks;
        state.snapshot.categories = categories;
        let revision = self.bump(&mut state);
        debug!(revision, tasks = state.snapshot.tasks.len(), "task list refreshed");
        Ok(revision)
    }
}
