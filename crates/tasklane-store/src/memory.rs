//! In-process store with failure injection.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tasklane_core::{
    Category, CategoryId, CategoryPatch, NewCategory, NewTask, Recurrence, ReorderUpdate, Task, TaskId,
    TaskPatch, UserId,
};
use time::OffsetDateTime;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::tables::Tables;

/// Store operations that can be observed and made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `list_tasks`.
    ListTasks,
    /// `list_completed_tasks`.
    ListCompletedTasks,
    /// `list_categories`.
    ListCategories,
    /// `insert_task`.
    InsertTask,
    /// `update_tasks`.
    UpdateTasks,
    /// `delete_tasks`.
    DeleteTasks,
    /// `insert_recurrence`.
    InsertRecurrence,
    /// `update_recurrence`.
    UpdateRecurrence,
    /// `batch_reorder`.
    BatchReorder,
    /// `insert_category`.
    InsertCategory,
    /// `update_category`.
    UpdateCategory,
    /// `delete_category`.
    DeleteCategory,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ListTasks => "list_tasks",
            Self::ListCompletedTasks => "list_completed_tasks",
            Self::ListCategories => "list_categories",
            Self::InsertTask => "insert_task",
            Self::UpdateTasks => "update_tasks",
            Self::DeleteTasks => "delete_tasks",
            Self::InsertRecurrence => "insert_recurrence",
            Self::UpdateRecurrence => "update_recurrence",
            Self::BatchReorder => "batch_reorder",
            Self::InsertCategory => "insert_category",
            Self::UpdateCategory => "update_category",
            Self::DeleteCategory => "delete_category",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Default)]
struct Faults {
    armed: HashMap<Operation, usize>,
    sticky: HashSet<Operation>,
    calls: HashMap<Operation, usize>,
}

#[derive(Debug, Default)]
struct Inner {
    tables: Mutex<Tables>,
    faults: Mutex<Faults>,
}

/// Store keeping every row in memory.
///
/// Clones share the same tables. Used for tests and ephemeral sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with `tables`.
    #[must_use]
    pub fn with_tables(tables: Tables) -> Self {
        let store = Self::default();
        *guard(&store.inner.tables) = tables;
        store
    }

    /// Copy of the current rows.
    #[must_use]
    pub fn snapshot(&self) -> Tables {
        guard(&self.inner.tables).clone()
    }

    /// Make the next `count` calls of `op` fail.
    pub fn fail_next(&self, op: Operation, count: usize) {
        *guard(&self.inner.faults).armed.entry(op).or_default() += count;
    }

    /// Make every call of `op` fail until [`MemoryStore::heal`].
    pub fn fail_always(&self, op: Operation) {
        guard(&self.inner.faults).sticky.insert(op);
    }

    /// Clear every failure armed for `op`.
    pub fn heal(&self, op: Operation) {
        let mut faults = guard(&self.inner.faults);
        faults.armed.remove(&op);
        faults.sticky.remove(&op);
    }

    /// Number of calls of `op` so far, failed ones included.
    #[must_use]
    pub fn calls(&self, op: Operation) -> usize {
        guard(&self.inner.faults).calls.get(&op).copied().unwrap_or(0)
    }

    fn enter(&self, op: Operation) -> Result<MutexGuard<'_, Tables>> {
        {
            let mut faults = guard(&self.inner.faults);
            *faults.calls.entry(op).or_default() += 1;
            let armed = faults.armed.get(&op).copied().unwrap_or(0);
            if armed > 0 {
                faults.armed.insert(op, armed - 1);
                debug!(%op, "injected failure");
                return Err(StoreError::Injected(op));
            }
            if faults.sticky.contains(&op) {
                debug!(%op, "injected failure");
                return Err(StoreError::Injected(op));
            }
        }
        Ok(guard(&self.inner.tables))
    }

    /// Tasks of `user` with their joins.
    ///
    /// # Errors
    /// Returns an injected failure when armed.
    pub fn list_tasks(&self, user: UserId) -> Result<Vec<Task>> {
        Ok(self.enter(Operation::ListTasks)?.list_tasks(user))
    }

    /// Completed tasks of `user`.
    ///
    /// # Errors
    /// Returns an injected failure when armed.
    pub fn list_completed_tasks(&self, user: UserId) -> Result<Vec<Task>> {
        Ok(self.enter(Operation::ListCompletedTasks)?.list_completed_tasks(user))
    }

    /// Categories of `user`.
    ///
    /// # Errors
    /// Returns an injected failure when armed.
    pub fn list_categories(&self, user: UserId) -> Result<Vec<Category>> {
        Ok(self.enter(Operation::ListCategories)?.list_categories(user))
    }

    /// Insert a task.
    ///
    /// # Errors
    /// Returns an injected failure or a missing category.
    pub fn insert_task(&self, row: NewTask) -> Result<Task> {
        self.enter(Operation::InsertTask)?
            .insert_task(row, OffsetDateTime::now_utc())
    }

    /// Patch tasks; returns the number changed.
    ///
    /// # Errors
    /// Returns an injected failure or a missing category.
    pub fn update_tasks(&self, ids: &[TaskId], patch: &TaskPatch) -> Result<usize> {
        self.enter(Operation::UpdateTasks)?.update_tasks(ids, patch)
    }

    /// Delete tasks; returns the number removed.
    ///
    /// # Errors
    /// Returns an injected failure when armed.
    pub fn delete_tasks(&self, ids: &[TaskId]) -> Result<usize> {
        Ok(self.enter(Operation::DeleteTasks)?.delete_tasks(ids))
    }

    /// Attach a recurrence.
    ///
    /// # Errors
    /// Returns an injected failure or a row conflict.
    pub fn insert_recurrence(&self, task: TaskId, recurrence: Recurrence) -> Result<()> {
        self.enter(Operation::InsertRecurrence)?
            .insert_recurrence(task, recurrence)
    }

    /// Replace a recurrence.
    ///
    /// # Errors
    /// Returns an injected failure or a missing row.
    pub fn update_recurrence(&self, task: TaskId, recurrence: Recurrence) -> Result<()> {
        self.enter(Operation::UpdateRecurrence)?
            .update_recurrence(task, recurrence)
    }

    /// Apply a reorder batch atomically.
    ///
    /// # Errors
    /// Returns an injected failure or an unknown row; nothing is applied then.
    pub fn batch_reorder(&self, updates: &[ReorderUpdate]) -> Result<()> {
        self.enter(Operation::BatchReorder)?.batch_reorder(updates)
    }

    /// Insert a category.
    ///
    /// # Errors
    /// Returns an injected failure when armed.
    pub fn insert_category(&self, row: NewCategory) -> Result<Category> {
        Ok(self
            .enter(Operation::InsertCategory)?
            .insert_category(row, OffsetDateTime::now_utc()))
    }

    /// Update a category.
    ///
    /// # Errors
    /// Returns an injected failure or a missing category.
    pub fn update_category(&self, id: CategoryId, patch: &CategoryPatch) -> Result<Category> {
        self.enter(Operation::UpdateCategory)?.update_category(id, patch)
    }

    /// Delete a category, detaching its tasks.
    ///
    /// # Errors
    /// Returns an injected failure or a missing category.
    pub fn delete_category(&self, id: CategoryId) -> Result<Vec<TaskId>> {
        self.enter(Operation::DeleteCategory)?.delete_category(id)
    }
}
