//! Relational task/category tables shared by every backend.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tasklane_core::{
    Category, CategoryId, CategoryPatch, NewCategory, NewTask, Recurrence, ReorderUpdate,
    Task, TaskId, TaskPatch, UserId,
};
use time::OffsetDateTime;

use crate::error::{Result, StoreError};

/// Category row with its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRow {
    /// Owner.
    pub user_id: UserId,
    /// Category columns.
    #[serde(flatten)]
    pub category: Category,
}

/// Every row a store holds.
///
/// Task rows carry their recurrence inline; the category join is filled in
/// when tasks are listed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tables {
    /// Task rows.
    #[serde(default)]
    pub tasks: Vec<Task>,
    /// Category rows.
    #[serde(default)]
    pub categories: Vec<CategoryRow>,
}

impl Tables {
    /// Tasks of `user` with categories joined, ordered by `sort_order`.
    #[must_use]
    pub fn list_tasks(&self, user: UserId) -> Vec<Task> {
        self.select(user, |_| true)
    }

    /// Completed tasks of `user`.
    #[must_use]
    pub fn list_completed_tasks(&self, user: UserId) -> Vec<Task> {
        self.select(user, Task::is_completed)
    }

    fn select(&self, user: UserId, keep: impl Fn(&Task) -> bool) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .iter()
            .filter(|task| task.user_id == user && keep(task))
            .map(|task| self.joined(task))
            .collect();
        tasks.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.created_at.cmp(&b.created_at)));
        tasks
    }

    fn joined(&self, task: &Task) -> Task {
        let mut task = task.clone();
        task.category = task.category_id.and_then(|id| self.category(id)).cloned();
        task
    }

    fn category(&self, id: CategoryId) -> Option<&Category> {
        self.categories
            .iter()
            .map(|row| &row.category)
            .find(|category| category.id == id)
    }

    /// Categories of `user` in creation order.
    #[must_use]
    pub fn list_categories(&self, user: UserId) -> Vec<Category> {
        let mut categories: Vec<Category> = self
            .categories
            .iter()
            .filter(|row| row.user_id == user)
            .map(|row| row.category.clone())
            .collect();
        categories.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        categories
    }

    /// Insert a task row stamped with `now`.
    ///
    /// # Errors
    /// Fails when the referenced category does not exist.
    pub fn insert_task(&mut self, row: NewTask, now: OffsetDateTime) -> Result<Task> {
        if let Some(id) = row.category_id
            && self.category(id).is_none()
        {
            return Err(StoreError::CategoryNotFound(id));
        }
        let task = Task {
            id: TaskId::new(),
            user_id: row.user_id,
            category_id: row.category_id,
            title: row.title,
            notes: row.notes,
            due_date: row.due_date,
            due_time: row.due_time,
            start_time: row.start_time,
            end_time: row.end_time,
            completed_at: None,
            sort_order: row.sort_order,
            created_at: now,
            recurrence: None,
            category: None,
        };
        self.tasks.push(task.clone());
        Ok(self.joined(&task))
    }

    /// Apply `patch` to every listed task; unknown ids are skipped.
    ///
    /// Returns the number of rows changed.
    ///
    /// # Errors
    /// Fails when the patch moves tasks into a missing category.
    pub fn update_tasks(&mut self, ids: &[TaskId], patch: &TaskPatch) -> Result<usize> {
        if let Some(tasklane_core::FieldPatch::Set(id)) = patch.category_id
            && self.category(id).is_none()
        {
            return Err(StoreError::CategoryNotFound(id));
        }
        let wanted: HashSet<TaskId> = ids.iter().copied().collect();
        let mut changed = 0;
        for task in self.tasks.iter_mut().filter(|task| wanted.contains(&task.id)) {
            patch.apply(task);
            task.category = None;
            changed += 1;
        }
        Ok(changed)
    }

    /// Delete every listed task with its recurrence; unknown ids are skipped.
    ///
    /// Returns the number of rows removed.
    pub fn delete_tasks(&mut self, ids: &[TaskId]) -> usize {
        let wanted: HashSet<TaskId> = ids.iter().copied().collect();
        let before = self.tasks.len();
        self.tasks.retain(|task| !wanted.contains(&task.id));
        before - self.tasks.len()
    }

    fn task_mut(&mut self, id: TaskId) -> Result<&mut Task> {
        self.tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or(StoreError::TaskNotFound(id))
    }

    /// Attach a recurrence row to `task`.
    ///
    /// # Errors
    /// Fails when the task is missing or already has a recurrence.
    pub fn insert_recurrence(&mut self, task: TaskId, recurrence: Recurrence) -> Result<()> {
        let row = self.task_mut(task)?;
        if row.recurrence.is_some() {
            return Err(StoreError::RecurrenceExists(task));
        }
        row.recurrence = Some(recurrence.normalized());
        Ok(())
    }

    /// Replace the recurrence row of `task`.
    ///
    /// # Errors
    /// Fails when the task is missing or has no recurrence.
    pub fn update_recurrence(&mut self, task: TaskId, recurrence: Recurrence) -> Result<()> {
        let row = self.task_mut(task)?;
        let Some(current) = row.recurrence.as_mut() else {
            return Err(StoreError::RecurrenceMissing(task));
        };
        *current = recurrence.normalized();
        Ok(())
    }

    /// Apply a reorder batch all-or-nothing.
    ///
    /// # Errors
    /// Fails without touching any row when a task or category is unknown.
    pub fn batch_reorder(&mut self, updates: &[ReorderUpdate]) -> Result<()> {
        for update in updates {
            if !self.tasks.iter().any(|task| task.id == update.id) {
                return Err(StoreError::TaskNotFound(update.id));
            }
            if let Some(id) = update.category_id
                && self.category(id).is_none()
            {
                return Err(StoreError::CategoryNotFound(id));
            }
        }
        for update in updates {
            let task = self.task_mut(update.id)?;
            task.sort_order = update.sort_order;
            task.category_id = update.category_id;
        }
        Ok(())
    }

    /// Insert a category row stamped with `now`.
    pub fn insert_category(&mut self, row: NewCategory, now: OffsetDateTime) -> Category {
        let category = Category {
            id: CategoryId::new(),
            name: row.name,
            color: row.color,
            created_at: now,
        };
        self.categories.push(CategoryRow {
            user_id: row.user_id,
            category: category.clone(),
        });
        category
    }

    /// Rename or recolor a category.
    ///
    /// # Errors
    /// Fails when the category does not exist.
    pub fn update_category(&mut self, id: CategoryId, patch: &CategoryPatch) -> Result<Category> {
        let row = self
            .categories
            .iter_mut()
            .find(|row| row.category.id == id)
            .ok_or(StoreError::CategoryNotFound(id))?;
        if let Some(name) = &patch.name {
            row.category.name.clone_from(name);
        }
        if let Some(color) = &patch.color {
            color.clone().apply_to(&mut row.category.color);
        }
        Ok(row.category.clone())
    }

    /// Delete a category and detach its tasks.
    ///
    /// Returns the ids of the detached tasks.
    ///
    /// # Errors
    /// Fails when the category does not exist.
    pub fn delete_category(&mut self, id: CategoryId) -> Result<Vec<TaskId>> {
        let before = self.categories.len();
        self.categories.retain(|row| row.category.id != id);
        if before == self.categories.len() {
            return Err(StoreError::CategoryNotFound(id));
        }
        let mut detached = Vec::new();
        for task in self.tasks.iter_mut().filter(|task| task.category_id == Some(id)) {
            task.category_id = None;
            detached.push(task.id);
        }
        Ok(detached)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use tasklane_core::FieldPatch;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2024-01-01 9:00 UTC);

    fn new_task(user: UserId, title: &str, category_id: Option<CategoryId>, sort_order: u32) -> NewTask {
        NewTask {
            user_id: user,
            category_id,
            title: title.into(),
            notes: None,
            due_date: None,
            due_time: None,
            start_time: None,
            end_time: None,
            sort_order,
        }
    }

    #[test]
    fn listing_is_scoped_and_joined() {
        let mut tables = Tables::default();
        let me = UserId::new();
        let work = tables.insert_category(
            NewCategory {
                user_id: me,
                name: "Work".into(),
                color: Some("#b91c1c".into()),
            },
            NOW,
        );
        tables.insert_task(new_task(me, "b", Some(work.id), 1), NOW).unwrap();
        tables.insert_task(new_task(me, "a", Some(work.id), 0), NOW).unwrap();
        tables.insert_task(new_task(UserId::new(), "other", None, 0), NOW).unwrap();

        let tasks = tables.list_tasks(me);
        assert_eq!(tasks.iter().map(|t| t.title.as_str()).collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(tasks[0].category.as_ref().map(|c| c.name.as_str()), Some("Work"));
        assert_eq!(tables.list_categories(me).len(), 1);
    }

    #[test]
    fn batch_reorder_is_all_or_nothing() {
        let mut tables = Tables::default();
        let me = UserId::new();
        let task = tables.insert_task(new_task(me, "a", None, 0), NOW).unwrap();
        let before = tables.clone();
        let err = tables
            .batch_reorder(&[
                ReorderUpdate {
                    id: task.id,
                    sort_order: 5,
                    category_id: None,
                },
                ReorderUpdate {
                    id: TaskId::new(),
                    sort_order: 0,
                    category_id: None,
                },
            ])
            .unwrap_err();
        assert!(matches!(err, StoreError::TaskNotFound(_)));
        assert_eq!(tables, before);
    }

    #[test]
    fn delete_is_idempotent() {
        let mut tables = Tables::default();
        let me = UserId::new();
        let task = tables.insert_task(new_task(me, "a", None, 0), NOW).unwrap();
        assert_eq!(tables.delete_tasks(&[task.id]), 1);
        assert_eq!(tables.delete_tasks(&[task.id]), 0);
    }

    #[test]
    fn deleting_category_detaches_tasks() {
        let mut tables = Tables::default();
        let me = UserId::new();
        let home = tables.insert_category(
            NewCategory {
                user_id: me,
                name: "Home".into(),
                color: None,
            },
            NOW,
        );
        let task = tables.insert_task(new_task(me, "a", Some(home.id), 0), NOW).unwrap();
        assert_eq!(tables.delete_category(home.id).unwrap(), vec![task.id]);
        let listed = tables.list_tasks(me);
        assert_eq!(listed[0].category_id, None);
        assert_eq!(listed[0].category, None);
    }

    #[test]
    fn recurrence_rows_are_unique_per_task() {
        let mut tables = Tables::default();
        let me = UserId::new();
        let task = tables.insert_task(new_task(me, "a", None, 0), NOW).unwrap();
        assert!(matches!(
            tables.update_recurrence(task.id, Recurrence::daily()),
            Err(StoreError::RecurrenceMissing(_))
        ));
        tables.insert_recurrence(task.id, Recurrence::weekly(Some(2))).unwrap();
        assert!(matches!(
            tables.insert_recurrence(task.id, Recurrence::daily()),
            Err(StoreError::RecurrenceExists(_))
        ));
        tables.update_recurrence(task.id, Recurrence::daily()).unwrap();
        assert_eq!(tables.list_tasks(me)[0].recurrence, Some(Recurrence::daily()));
    }

    #[test]
    fn update_rejects_unknown_category() {
        let mut tables = Tables::default();
        let me = UserId::new();
        let task = tables.insert_task(new_task(me, "a", None, 0), NOW).unwrap();
        let patch = TaskPatch {
            category_id: Some(FieldPatch::Set(CategoryId::new())),
            ..TaskPatch::default()
        };
        assert!(matches!(
            tables.update_tasks(&[task.id], &patch),
            Err(StoreError::CategoryNotFound(_))
        ));
    }
}
