//! Task and category mutations initiated by the user.

use tasklane_core::ordering::is_dense;
use tasklane_core::temporal::format_instant;
use tasklane_core::{
    CATEGORY_COLORS, Category, CategoryId, CategoryPatch, Clock, FieldPatch, GroupKey, GroupedLists,
    MoveInstruction, NewCategory, NewTask, RecurrencePattern, Task, TaskFields, TaskId, TaskPatch, UserId,
    ValidationError, plan_move,
};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::session::SessionProvider;
use crate::store::TaskStore;
use crate::task_list::TaskList;

/// Errors surfaced to the user by [`TaskService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Nobody is signed in.
    #[error("not signed in")]
    NotAuthenticated,
    /// The submitted fields are invalid.
    #[error(transparent)]
    InvalidTask(#[from] ValidationError),
    /// Target task could not be found.
    #[error("task {0} not found")]
    MissingTask(TaskId),
    /// Target category could not be found.
    #[error("category {0} not found")]
    MissingCategory(CategoryId),
    /// The completion timestamp could not be rendered.
    #[error("failed to format timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
    /// Backing store returned an error.
    #[error("store error: {0}")]
    Store(anyhow::Error),
}

/// Service façade over the store for everything except drag reordering.
///
/// Every successful mutation refreshes the shared [`TaskList`]; a failed
/// refresh is logged and does not fail the mutation.
#[derive(Debug)]
pub struct TaskService<S, P, C> {
    store: S,
    session: P,
    clock: C,
    list: TaskList,
}

impl<S, P, C> TaskService<S, P, C> {
    /// Construct a new service.
    #[must_use]
    pub const fn new(store: S, session: P, clock: C, list: TaskList) -> Self {
        Self {
            store,
            session,
            clock,
            list,
        }
    }

    /// Shared confirmed list.
    #[must_use]
    pub const fn list(&self) -> &TaskList {
        &self.list
    }

    /// Expose a reference to the underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Clock used for defaults and completion timestamps.
    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }
}

impl<S, P, C> TaskService<S, P, C>
where
    S: TaskStore,
    P: SessionProvider,
    C: Clock,
{
    fn store_error(err: S::Error) -> ServiceError {
        ServiceError::Store(err.into())
    }

    async fn user(&self) -> Result<UserId, ServiceError> {
        self.session
            .current_user()
            .await
            .ok_or(ServiceError::NotAuthenticated)
    }

    async fn refresh(&self, user: UserId) {
        if let Err(err) = self.list.refresh(&self.store, user).await {
            warn!(error = %err, "failed to refresh task list");
        }
    }

    async fn tasks(&self, user: UserId) -> Result<Vec<Task>, ServiceError> {
        self.store.list_tasks(user).await.map_err(Self::store_error)
    }

    async fn ensure_category(&self, user: UserId, id: CategoryId) -> Result<Category, ServiceError> {
        self.store
            .list_categories(user)
            .await
            .map_err(Self::store_error)?
            .into_iter()
            .find(|category| category.id == id)
            .ok_or(ServiceError::MissingCategory(id))
    }

    /// Write the dense order of `key` when the tasks left in it have gaps.
    async fn settle_group(&self, tasks: &[Task], key: GroupKey) -> Result<(), ServiceError> {
        if is_dense(tasks, key) {
            return Ok(());
        }
        let updates = GroupedLists::from_tasks(tasks).normalize(key);
        debug!(group = %key, count = updates.len(), "renumbering group");
        self.store
            .batch_reorder(&updates)
            .await
            .map_err(Self::store_error)
    }

    /// Reload the signed-in user's tasks and categories.
    ///
    /// # Errors
    /// Returns [`ServiceError::NotAuthenticated`] when signed out, or the store error.
    pub async fn load(&self) -> Result<u64, ServiceError> {
        let user = self.user().await?;
        self.list
            .refresh(&self.store, user)
            .await
            .map_err(ServiceError::Store)
    }

    /// Create a task at the end of its group.
    ///
    /// A due or start time without a due date is scheduled for today. The
    /// recurrence row is only written for daily and weekly tasks.
    ///
    /// # Errors
    /// Fails when signed out, when the fields are invalid, when the category
    /// does not exist, or when the store rejects a write.
    #[instrument(skip_all, fields(title = %fields.title))]
    pub async fn create_task(&self, fields: TaskFields) -> Result<Task, ServiceError> {
        let user = self.user().await?;
        let fields = fields.normalized(self.clock.today());
        fields.validate()?;
        let category = match fields.category_id {
            Some(id) => Some(self.ensure_category(user, id).await?),
            None => None,
        };

        let tasks = self.tasks(user).await?;
        let sort_order = GroupedLists::from_tasks(&tasks).append_index(fields.category_id.into());
        let recurrence = fields.recurrence;
        let mut task = self
            .store
            .insert_task(NewTask::from_fields(user, fields, sort_order))
            .await
            .map_err(Self::store_error)?;
        if recurrence.pattern != RecurrencePattern::None {
            self.store
                .insert_recurrence(task.id, recurrence)
                .await
                .map_err(Self::store_error)?;
            task.recurrence = Some(recurrence);
        }
        task.category = category;
        info!(task = %task.id, sort_order, "created task");
        self.refresh(user).await;
        Ok(task)
    }

    /// Replace the editable fields of a task.
    ///
    /// Moving the task to another category appends it to the new group and
    /// renumbers both groups in one batch. An existing recurrence row is always
    /// rewritten; a missing one is only created for daily and weekly tasks.
    ///
    /// # Errors
    /// Fails when signed out, when the fields are invalid, when the task or
    /// the category does not exist, or when the store rejects a write.
    #[instrument(skip(self, fields), fields(task = %id))]
    pub async fn update_task(&self, id: TaskId, fields: TaskFields) -> Result<(), ServiceError> {
        let user = self.user().await?;
        let fields = fields.normalized(self.clock.today());
        fields.validate()?;
        let tasks = self.tasks(user).await?;
        let current = tasks
            .iter()
            .find(|task| task.id == id)
            .ok_or(ServiceError::MissingTask(id))?;
        if let Some(category) = fields.category_id
            && current.category_id != Some(category)
        {
            self.ensure_category(user, category).await?;
        }

        let recurrence = fields.recurrence;
        let mut patch = TaskPatch::from_fields(current, fields);
        if let Some(change) = patch.category_id.take() {
            let target = match change {
                FieldPatch::Set(category) => GroupKey::Category(category),
                FieldPatch::Clear => GroupKey::Uncategorized,
            };
            let grouped = GroupedLists::from_tasks(&tasks);
            let instruction = MoveInstruction {
                task: id,
                source: current.group_key(),
                target,
                target_index: grouped.group(target).len(),
            };
            if let Some(plan) = plan_move(&grouped, instruction).map_err(|_| ServiceError::MissingTask(id))? {
                self.store
                    .batch_reorder(&plan.updates)
                    .await
                    .map_err(Self::store_error)?;
                debug!(target = %target, "moved task to new group");
            }
        }
        if !patch.is_empty() {
            self.store
                .update_tasks(&[id], &patch)
                .await
                .map_err(Self::store_error)?;
        }

        match current.recurrence {
            Some(existing) if existing != recurrence => {
                self.store
                    .update_recurrence(id, recurrence)
                    .await
                    .map_err(Self::store_error)?;
            }
            None if recurrence.pattern != RecurrencePattern::None => {
                self.store
                    .insert_recurrence(id, recurrence)
                    .await
                    .map_err(Self::store_error)?;
            }
            _ => {}
        }
        info!("updated task");
        self.refresh(user).await;
        Ok(())
    }

    /// Mark a task completed now, or reopen it.
    ///
    /// # Errors
    /// Fails when signed out, when the task does not exist, or when the store
    /// rejects the write.
    #[instrument(skip(self), fields(task = %id))]
    pub async fn toggle_complete(&self, id: TaskId, completed: bool) -> Result<(), ServiceError> {
        let user = self.user().await?;
        let patch = if completed {
            TaskPatch::complete_at(format_instant(self.clock.now())?)
        } else {
            TaskPatch::clear_completion()
        };
        let changed = self
            .store
            .update_tasks(&[id], &patch)
            .await
            .map_err(Self::store_error)?;
        if changed == 0 {
            return Err(ServiceError::MissingTask(id));
        }
        info!(completed, "toggled task");
        self.refresh(user).await;
        Ok(())
    }

    /// Delete a task and close the gap it leaves in its group.
    ///
    /// # Errors
    /// Fails when signed out, when the task does not exist, or when the store
    /// rejects a write.
    #[instrument(skip(self), fields(task = %id))]
    pub async fn delete_task(&self, id: TaskId) -> Result<(), ServiceError> {
        let user = self.user().await?;
        let mut tasks = self.tasks(user).await?;
        let index = tasks
            .iter()
            .position(|task| task.id == id)
            .ok_or(ServiceError::MissingTask(id))?;
        let removed = tasks.remove(index);
        self.store
            .delete_tasks(&[id])
            .await
            .map_err(Self::store_error)?;
        self.settle_group(&tasks, removed.group_key()).await?;
        info!("deleted task");
        self.refresh(user).await;
        Ok(())
    }

    /// Create a category; the color defaults to the first palette entry.
    ///
    /// # Errors
    /// Fails when signed out, when the name is blank, or when the store
    /// rejects the insert.
    #[instrument(skip(self))]
    pub async fn create_category(&self, name: &str, color: Option<String>) -> Result<Category, ServiceError> {
        let user = self.user().await?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyCategoryName.into());
        }
        let color = color.unwrap_or_else(|| CATEGORY_COLORS[0].to_owned());
        let category = self
            .store
            .insert_category(NewCategory {
                user_id: user,
                name: name.to_owned(),
                color: Some(color),
            })
            .await
            .map_err(Self::store_error)?;
        info!(category = %category.id, "created category");
        self.refresh(user).await;
        Ok(category)
    }

    /// Rename and/or recolor a category.
    ///
    /// # Errors
    /// Fails when signed out, when the new name is blank, when the category
    /// does not exist, or when the store rejects the write.
    #[instrument(skip(self))]
    pub async fn update_category(
        &self,
        id: CategoryId,
        name: Option<&str>,
        color: Option<String>,
    ) -> Result<Category, ServiceError> {
        let user = self.user().await?;
        let name = name.map(str::trim);
        if name.is_some_and(str::is_empty) {
            return Err(ValidationError::EmptyCategoryName.into());
        }
        self.ensure_category(user, id).await?;
        let patch = CategoryPatch {
            name: name.map(str::to_owned),
            color: color.map(FieldPatch::Set),
        };
        let category = self
            .store
            .update_category(id, &patch)
            .await
            .map_err(Self::store_error)?;
        info!("updated category");
        self.refresh(user).await;
        Ok(category)
    }

    /// Delete a category; its tasks move to the uncategorized group, which is
    /// then renumbered.
    ///
    /// # Errors
    /// Fails when signed out, when the category does not exist, or when the
    /// store rejects a write.
    #[instrument(skip(self))]
    pub async fn delete_category(&self, id: CategoryId) -> Result<Vec<TaskId>, ServiceError> {
        let user = self.user().await?;
        self.ensure_category(user, id).await?;
        let detached = self
            .store
            .delete_category(id)
            .await
            .map_err(Self::store_error)?;
        if !detached.is_empty() {
            let tasks = self.tasks(user).await?;
            self.settle_group(&tasks, GroupKey::Uncategorized).await?;
        }
        info!(detached = detached.len(), "deleted category");
        self.refresh(user).await;
        Ok(detached)
    }
}
