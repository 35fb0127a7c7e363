//! Drag-and-drop reordering with optimistic update and rollback.
//!
//! The coordinator keeps its own working copy of the task list. A move is
//! applied to that copy immediately, then persisted as one atomic batch. If
//! the batch fails and no newer move has been started since, the working copy
//! is replaced wholesale by the last confirmed [`Snapshot`](crate::task_list::Snapshot).

use std::sync::{Mutex, MutexGuard, PoisonError};

use tasklane_core::ordering::apply_updates;
use tasklane_core::{
    Category, DropTarget, GroupedLists, MovePlan, OrderingError, ReorderUpdate, Task, TaskId, plan_move,
};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::notify::{Notification, Notifier};
use crate::session::SessionProvider;
use crate::store::{TaskStore, into_anyhow};
use crate::task_list::TaskList;

/// Message shown when a batch is rejected.
pub const SAVE_FAILED: &str = "Failed to save task order";

/// Errors returned by [`ReorderCoordinator::move_task`].
#[derive(Debug, Error)]
pub enum ReorderError {
    /// Nobody is signed in.
    #[error("not signed in")]
    NotAuthenticated,
    /// The drag names a task that is not in the list.
    #[error(transparent)]
    Ordering(#[from] OrderingError),
    /// The store rejected the batch; no position changed.
    #[error("failed to save task order (operation {seq})")]
    Persist {
        /// Sequence number of the rejected operation.
        seq: u64,
        /// Store error.
        #[source]
        source: anyhow::Error,
    },
}

/// Result of a successful drag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReorderOutcome {
    /// The drop left every position as it was; nothing was persisted.
    Unchanged,
    /// The batch was persisted.
    Saved {
        /// Sequence number of the operation.
        seq: u64,
        /// Persisted assignment.
        updates: Vec<ReorderUpdate>,
    },
}

#[derive(Debug, Default)]
struct ReorderState {
    tasks: Vec<Task>,
    categories: Vec<Category>,
    // Revision of the confirmed list the working copy was last taken from.
    synced_revision: Option<u64>,
    next_seq: u64,
    latest_seq: u64,
    in_flight: usize,
}

/// Owner of the optimistic task list.
#[derive(Debug)]
pub struct ReorderCoordinator<S, P, N> {
    store: S,
    session: P,
    list: TaskList,
    notifier: N,
    state: Mutex<ReorderState>,
}

impl<S, P, N> ReorderCoordinator<S, P, N>
where
    S: TaskStore,
    P: SessionProvider,
    N: Notifier,
{
    /// Coordinator over `list`; the working copy is taken from it on first use.
    #[must_use]
    pub fn new(store: S, session: P, list: TaskList, notifier: N) -> Self {
        Self {
            store,
            session,
            list,
            notifier,
            state: Mutex::new(ReorderState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ReorderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn adopt_confirmed(&self, state: &mut ReorderState) {
        let snapshot = self.list.snapshot();
        state.tasks = snapshot.tasks;
        state.categories = snapshot.categories;
        state.synced_revision = Some(snapshot.revision);
    }

    fn sync_if_idle(&self, state: &mut ReorderState) -> bool {
        if state.in_flight > 0 || state.synced_revision == Some(self.list.revision()) {
            return false;
        }
        self.adopt_confirmed(state);
        true
    }

    /// Take the confirmed list as the working copy unless a batch is pending.
    ///
    /// Returns whether the working copy changed.
    #[allow(clippy::must_use_candidate)]
    pub fn sync(&self) -> bool {
        let mut state = self.lock();
        self.sync_if_idle(&mut state)
    }

    /// Working copy, including moves not yet confirmed.
    #[must_use]
    pub fn tasks(&self) -> Vec<Task> {
        let mut state = self.lock();
        self.sync_if_idle(&mut state);
        state.tasks.clone()
    }

    /// Working copy grouped for rendering.
    #[must_use]
    pub fn grouped(&self) -> GroupedLists {
        let mut state = self.lock();
        self.sync_if_idle(&mut state);
        GroupedLists::from_tasks(&state.tasks)
    }

    /// Number of batches awaiting the store.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.lock().in_flight
    }

    fn plan(&self, task: TaskId, target: DropTarget) -> Result<Option<(u64, MovePlan)>, ReorderError> {
        let mut state = self.lock();
        self.sync_if_idle(&mut state);
        let grouped = GroupedLists::from_tasks(&state.tasks);
        let instruction = grouped.resolve_drop(task, target)?;
        let Some(plan) = plan_move(&grouped, instruction)? else {
            return Ok(None);
        };
        let ReorderState { tasks, categories, .. } = &mut *state;
        apply_updates(tasks, &plan.updates, categories);
        state.next_seq += 1;
        state.latest_seq = state.next_seq;
        state.in_flight += 1;
        Ok(Some((state.next_seq, plan)))
    }

    /// Move `task` to where it was dropped and persist the new order.
    ///
    /// The working copy reflects the move before this future first yields.
    /// On failure the working copy is restored to the last confirmed list,
    /// unless a newer move has started in the meantime, and one error
    /// notification is emitted.
    ///
    /// # Errors
    /// Returns [`ReorderError::NotAuthenticated`] when signed out,
    /// [`ReorderError::Ordering`] for unknown tasks and
    /// [`ReorderError::Persist`] when the store rejects the batch.
    #[instrument(skip(self))]
    pub async fn move_task(&self, task: TaskId, target: DropTarget) -> Result<ReorderOutcome, ReorderError> {
        let user = self
            .session
            .current_user()
            .await
            .ok_or(ReorderError::NotAuthenticated)?;
        let Some((seq, plan)) = self.plan(task, target)? else {
            debug!("drop left positions unchanged");
            return Ok(ReorderOutcome::Unchanged);
        };
        let updates = plan.updates;
        debug!(seq, count = updates.len(), target = %plan.instruction.target, "persisting reorder");

        if let Err(err) = self.store.batch_reorder(&updates).await {
            let source = into_anyhow(err);
            let rolled_back = {
                let mut state = self.lock();
                state.in_flight -= 1;
                let latest = state.latest_seq == seq;
                if latest {
                    self.adopt_confirmed(&mut state);
                }
                latest
            };
            warn!(seq, rolled_back, error = %source, "reorder rejected");
            self.notifier.notify(Notification::error(SAVE_FAILED));
            return Err(ReorderError::Persist { seq, source });
        }

        self.list.apply_confirmed(&updates);
        if let Err(err) = self.list.refresh(&self.store, user).await {
            warn!(seq, error = %err, "failed to refresh task list after reorder");
        }
        {
            let mut state = self.lock();
            state.in_flight -= 1;
            if state.in_flight == 0 {
                self.adopt_confirmed(&mut state);
            }
        }
        info!(seq, count = updates.len(), "task order saved");
        Ok(ReorderOutcome::Saved { seq, updates })
    }
}
