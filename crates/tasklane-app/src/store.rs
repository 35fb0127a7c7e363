//! Async persistence seam consumed by the services.

use std::future::Future;

use anyhow::{Error, anyhow};
use tasklane_core::{
    Category, CategoryId, CategoryPatch, NewCategory, NewTask, Recurrence, ReorderUpdate, Task, TaskId,
    TaskPatch, UserId,
};
use tasklane_store::{JsonStore, MemoryStore, StoreError};

/// Durable task storage.
///
/// Every future is `Send` so the services can run on any tokio runtime.
pub trait TaskStore: Send + Sync {
    /// Error type bubbled up from the backing store.
    type Error: Into<Error> + Send;

    /// Every task of `user` with recurrence and category joined.
    ///
    /// # Errors
    /// Returns a store-specific error when the query fails.
    fn list_tasks(&self, user: UserId) -> impl Future<Output = Result<Vec<Task>, Self::Error>> + Send;

    /// Tasks of `user` with a completion timestamp.
    ///
    /// # Errors
    /// Returns a store-specific error when the query fails.
    fn list_completed_tasks(&self, user: UserId) -> impl Future<Output = Result<Vec<Task>, Self::Error>> + Send;

    /// Categories of `user` in creation order.
    ///
    /// # Errors
    /// Returns a store-specific error when the query fails.
    fn list_categories(&self, user: UserId) -> impl Future<Output = Result<Vec<Category>, Self::Error>> + Send;

    /// Insert a task row.
    ///
    /// # Errors
    /// Returns a store-specific error when the insert fails.
    fn insert_task(&self, row: NewTask) -> impl Future<Output = Result<Task, Self::Error>> + Send;

    /// Apply one patch to every id; returns the number of rows changed.
    ///
    /// # Errors
    /// Returns a store-specific error when the update fails.
    fn update_tasks(
        &self,
        ids: &[TaskId],
        patch: &TaskPatch,
    ) -> impl Future<Output = Result<usize, Self::Error>> + Send;

    /// Delete every id; returns the number of rows removed.
    ///
    /// # Errors
    /// Returns a store-specific error when the delete fails.
    fn delete_tasks(&self, ids: &[TaskId]) -> impl Future<Output = Result<usize, Self::Error>> + Send;

    /// Attach a recurrence row to a task.
    ///
    /// # Errors
    /// Returns a store-specific error when the insert fails.
    fn insert_recurrence(
        &self,
        task: TaskId,
        recurrence: Recurrence,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Replace the recurrence row of a task.
    ///
    /// # Errors
    /// Returns a store-specific error when the update fails.
    fn update_recurrence(
        &self,
        task: TaskId,
        recurrence: Recurrence,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Apply positions and categories all-or-nothing.
    ///
    /// # Errors
    /// Returns a store-specific error when the batch is rejected; no row changes then.
    fn batch_reorder(&self, updates: &[ReorderUpdate]) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Insert a category row.
    ///
    /// # Errors
    /// Returns a store-specific error when the insert fails.
    fn insert_category(&self, row: NewCategory) -> impl Future<Output = Result<Category, Self::Error>> + Send;

    /// Rename or recolor a category.
    ///
    /// # Errors
    /// Returns a store-specific error when the update fails.
    fn update_category(
        &self,
        id: CategoryId,
        patch: &CategoryPatch,
    ) -> impl Future<Output = Result<Category, Self::Error>> + Send;

    /// Delete a category, detaching its tasks; returns the detached ids.
    ///
    /// # Errors
    /// Returns a store-specific error when the delete fails.
    fn delete_category(&self, id: CategoryId) -> impl Future<Output = Result<Vec<TaskId>, Self::Error>> + Send;
}

/// Erase a store-specific error.
pub(crate) fn into_anyhow<E: Into<Error>>(err: E) -> Error {
    err.into()
}

#[allow(clippy::unused_async)]
impl TaskStore for MemoryStore {
    type Error = StoreError;

    async fn list_tasks(&self, user: UserId) -> Result<Vec<Task>, Self::Error> {
        Self::list_tasks(self, user)
    }

    async fn list_completed_tasks(&self, user: UserId) -> Result<Vec<Task>, Self::Error> {
        Self::list_completed_tasks(self, user)
    }

    async fn list_categories(&self, user: UserId) -> Result<Vec<Category>, Self::Error> {
        Self::list_categories(self, user)
    }

    async fn insert_task(&self, row: NewTask) -> Result<Task, Self::Error> {
        Self::insert_task(self, row)
    }

    async fn update_tasks(&self, ids: &[TaskId], patch: &TaskPatch) -> Result<usize, Self::Error> {
        Self::update_tasks(self, ids, patch)
    }

    async fn delete_tasks(&self, ids: &[TaskId]) -> Result<usize, Self::Error> {
        Self::delete_tasks(self, ids)
    }

    async fn insert_recurrence(&self, task: TaskId, recurrence: Recurrence) -> Result<(), Self::Error> {
        Self::insert_recurrence(self, task, recurrence)
    }

    async fn update_recurrence(&self, task: TaskId, recurrence: Recurrence) -> Result<(), Self::Error> {
        Self::update_recurrence(self, task, recurrence)
    }

    async fn batch_reorder(&self, updates: &[ReorderUpdate]) -> Result<(), Self::Error> {
        Self::batch_reorder(self, updates)
    }

    async fn insert_category(&self, row: NewCategory) -> Result<Category, Self::Error> {
        Self::insert_category(self, row)
    }

    async fn update_category(&self, id: CategoryId, patch: &CategoryPatch) -> Result<Category, Self::Error> {
        Self::update_category(self, id, patch)
    }

    async fn delete_category(&self, id: CategoryId) -> Result<Vec<TaskId>, Self::Error> {
        Self::delete_category(self, id)
    }
}

/// Run a blocking file operation on the blocking pool with a clone of the store.
async fn blocking<T, F>(store: &JsonStore, op: F) -> Result<T, Error>
where
    T: Send + 'static,
    F: FnOnce(&JsonStore) -> Result<T, StoreError> + Send + 'static,
{
    let store = store.clone();
    tokio::task::spawn_blocking(move || op(&store))
        .await
        .map_err(|e| anyhow!("Task join error: {e}"))?
        .map_err(Error::from)
}

impl TaskStore for JsonStore {
    type Error = Error;

    async fn list_tasks(&self, user: UserId) -> Result<Vec<Task>, Self::Error> {
        blocking(self, move |store| store.list_tasks(user)).await
    }

    async fn list_completed_tasks(&self, user: UserId) -> Result<Vec<Task>, Self::Error> {
        blocking(self, move |store| store.list_completed_tasks(user)).await
    }

    async fn list_categories(&self, user: UserId) -> Result<Vec<Category>, Self::Error> {
        blocking(self, move |store| store.list_categories(user)).await
    }

    async fn insert_task(&self, row: NewTask) -> Result<Task, Self::Error> {
        blocking(self, move |store| store.insert_task(row)).await
    }

    async fn update_tasks(&self, ids: &[TaskId], patch: &TaskPatch) -> Result<usize, Self::Error> {
        let ids = ids.to_vec();
        let patch = patch.clone();
        blocking(self, move |store| store.update_tasks(&ids, &patch)).await
    }

    async fn delete_tasks(&self, ids: &[TaskId]) -> Result<usize, Self::Error> {
        let ids = ids.to_vec();
        blocking(self, move |store| store.delete_tasks(&ids)).await
    }

    async fn insert_recurrence(&self, task: TaskId, recurrence: Recurrence) -> Result<(), Self::Error> {
        blocking(self, move |store| store.insert_recurrence(task, recurrence)).await
    }

    async fn update_recurrence(&self, task: TaskId, recurrence: Recurrence) -> Result<(), Self::Error> {
        blocking(self, move |store| store.update_recurrence(task, recurrence)).await
    }

    async fn batch_reorder(&self, updates: &[ReorderUpdate]) -> Result<(), Self::Error> {
        let updates = updates.to_vec();
        blocking(self, move |store| store.batch_reorder(&updates)).await
    }

    async fn insert_category(&self, row: NewCategory) -> Result<Category, Self::Error> {
        blocking(self, move |store| store.insert_category(row)).await
    }

    async fn update_category(&self, id: CategoryId, patch: &CategoryPatch) -> Result<Category, Self::Error> {
        let patch = patch.clone();
        blocking(self, move |store| store.update_category(id, &patch)).await
    }

    async fn delete_category(&self, id: CategoryId) -> Result<Vec<TaskId>, Self::Error> {
        blocking(self, move |store| store.delete_category(id)).await
    }
}
