//! Row payloads exchanged with the task store.

use serde::{Deserialize, Serialize};

use crate::id::{CategoryId, TaskId, UserId};
use crate::task::{Task, TaskFields};

/// Patch for an optional column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldPatch<T> {
    /// Store the provided value.
    Set(T),
    /// Reset the column to null.
    Clear,
}

impl<T> FieldPatch<T> {
    /// Patch turning `current` into `desired`, or `None` when they already match.
    #[must_use]
    pub fn diff(current: Option<&T>, desired: Option<T>) -> Option<Self>
    where
        T: PartialEq,
    {
        match (current, desired) {
            (Some(old), Some(new)) if *old == new => None,
            (_, Some(new)) => Some(Self::Set(new)),
            (Some(_), None) => Some(Self::Clear),
            (None, None) => None,
        }
    }

    /// Write the patch into `slot`.
    pub fn apply_to(self, slot: &mut Option<T>) {
        *slot = match self {
            Self::Set(value) => Some(value),
            Self::Clear => None,
        };
    }
}

/// Batch field update applied by `update_tasks`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    /// New title.
    pub title: Option<String>,
    /// Notes change.
    pub notes: Option<FieldPatch<String>>,
    /// Category change.
    pub category_id: Option<FieldPatch<CategoryId>>,
    /// Due date change.
    pub due_date: Option<FieldPatch<String>>,
    /// Due time change.
    pub due_time: Option<FieldPatch<String>>,
    /// Time block start change.
    pub start_time: Option<FieldPatch<String>>,
    /// Time block end change.
    pub end_time: Option<FieldPatch<String>>,
    /// Completion change.
    pub completed_at: Option<FieldPatch<String>>,
    /// New position within the group.
    pub sort_order: Option<u32>,
}

#[allow(clippy::missing_const_for_fn)]
impl TaskPatch {
    /// Patch reopening a completed task.
    #[must_use]
    pub fn clear_completion() -> Self {
        Self {
            completed_at: Some(FieldPatch::Clear),
            ..Self::default()
        }
    }

    /// Patch marking a task completed at `completed_at` (RFC 3339).
    #[must_use]
    pub fn complete_at(completed_at: String) -> Self {
        Self {
            completed_at: Some(FieldPatch::Set(completed_at)),
            ..Self::default()
        }
    }

    /// Compute the patch turning `task` into the edited `fields`.
    ///
    /// Recurrence is stored in its own row and is not part of the patch.
    #[must_use]
    pub fn from_fields(task: &Task, fields: TaskFields) -> Self {
        let TaskFields {
            title,
            notes,
            category_id,
            due_date,
            due_time,
            start_time,
            end_time,
            recurrence: _,
        } = fields;

        Self {
            title: (title != task.title).then_some(title),
            notes: FieldPatch::diff(task.notes.as_ref(), notes),
            category_id: FieldPatch::diff(task.category_id.as_ref(), category_id),
            due_date: FieldPatch::diff(task.due_date.as_ref(), due_date),
            due_time: FieldPatch::diff(task.due_time.as_ref(), due_time),
            start_time: FieldPatch::diff(task.start_time.as_ref(), start_time),
            end_time: FieldPatch::diff(task.end_time.as_ref(), end_time),
            completed_at: None,
            sort_order: None,
        }
    }

    /// Returns true when applying the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.notes.is_none()
            && self.category_id.is_none()
            && self.due_date.is_none()
            && self.due_time.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.completed_at.is_none()
            && self.sort_order.is_none()
    }

    /// Apply the patch to a task row.
    pub fn apply(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title.clone_from(title);
        }
        let text_columns = [
            (&self.notes, &mut task.notes),
            (&self.due_date, &mut task.due_date),
            (&self.due_time, &mut task.due_time),
            (&self.start_time, &mut task.start_time),
            (&self.end_time, &mut task.end_time),
            (&self.completed_at, &mut task.completed_at),
        ];
        for (patch, slot) in text_columns {
            if let Some(patch) = patch {
                patch.clone().apply_to(slot);
            }
        }
        if let Some(patch) = &self.category_id {
            patch.clone().apply_to(&mut task.category_id);
            if task.category.as_ref().map(|c| c.id) != task.category_id {
                task.category = None;
            }
        }
        if let Some(order) = self.sort_order {
            task.sort_order = order;
        }
    }
}

/// Task row handed to `insert_task`; the store assigns id and creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    /// Owner.
    pub user_id: UserId,
    /// Category.
    pub category_id: Option<CategoryId>,
    /// Title.
    pub title: String,
    /// Notes.
    pub notes: Option<String>,
    /// Due date.
    pub due_date: Option<String>,
    /// Due time.
    pub due_time: Option<String>,
    /// Time block start.
    pub start_time: Option<String>,
    /// Time block end.
    pub end_time: Option<String>,
    /// Initial position (appended to the group).
    pub sort_order: u32,
}

impl NewTask {
    /// Row for validated `fields` owned by `user_id` at position `sort_order`.
    #[must_use]
    pub fn from_fields(user_id: UserId, fields: TaskFields, sort_order: u32) -> Self {
        Self {
            user_id,
            category_id: fields.category_id,
            title: fields.title,
            notes: fields.notes,
            due_date: fields.due_date,
            due_time: fields.due_time,
            start_time: fields.start_time,
            end_time: fields.end_time,
            sort_order,
        }
    }
}

/// Category row handed to `insert_category`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCategory {
    /// Owner.
    pub user_id: UserId,
    /// Name.
    pub name: String,
    /// Color.
    pub color: Option<String>,
}

/// Category changes handed to `update_category`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryPatch {
    /// New name.
    pub name: Option<String>,
    /// Color change.
    pub color: Option<FieldPatch<String>>,
}

/// One entry of an atomic reorder batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderUpdate {
    /// Task being positioned.
    pub id: TaskId,
    /// Dense position within the group.
    pub sort_order: u32,
    /// Group the task belongs to after the batch.
    pub category_id: Option<CategoryId>,
}
