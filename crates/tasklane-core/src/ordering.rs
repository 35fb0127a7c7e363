//! Dense per-group ordering.
//!
//! Each group is an explicit ordered id sequence. Moves are computed on those
//! sequences and emitted as the full `(id, sort_order, category_id)` set of
//! every affected group, so a single atomic batch leaves each group numbered
//! `0..len`.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use thiserror::Error;

use crate::id::TaskId;
use crate::patch::ReorderUpdate;
use crate::task::{Category, GroupKey, Task};

/// Errors raised while planning a move.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderingError {
    /// The dragged or targeted task is not part of any group.
    #[error("task {0} is not in the list")]
    UnknownTask(TaskId),
    /// The move names a source group the task is not in.
    #[error("task {task} is not in group {group}")]
    NotInGroup {
        /// Dragged task.
        task: TaskId,
        /// Claimed source group.
        group: GroupKey,
    },
}

/// Where a dragged task was released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropTarget {
    /// Onto another task; the dragged task takes that task's position.
    Task(TaskId),
    /// Onto a group container; the dragged task goes first.
    Group(GroupKey),
    /// Onto an explicit position of a group; clamped to the group length.
    Slot {
        /// Target group.
        group: GroupKey,
        /// Position within the group.
        index: usize,
    },
}

/// A single move of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveInstruction {
    /// Task being moved.
    pub task: TaskId,
    /// Group the task currently belongs to.
    pub source: GroupKey,
    /// Group the task ends up in.
    pub target: GroupKey,
    /// Position within the target group; clamped to the valid range.
    pub target_index: usize,
}

/// Ordered id sequences keyed by group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupedLists {
    groups: BTreeMap<GroupKey, Vec<TaskId>>,
}

impl GroupedLists {
    /// Group `tasks` by category, each group ordered by `sort_order` and then
    /// `created_at` ascending.
    #[must_use]
    pub fn from_tasks<'a, I>(tasks: I) -> Self
    where
        I: IntoIterator<Item = &'a Task>,
    {
        let mut buckets: BTreeMap<GroupKey, Vec<&Task>> = BTreeMap::new();
        for task in tasks {
            buckets.entry(task.group_key()).or_default().push(task);
        }
        let groups = buckets
            .into_iter()
            .map(|(key, mut members)| {
                members.sort_by(|a, b| group_order(a, b));
                (key, members.into_iter().map(|task| task.id).collect())
            })
            .collect();
        Self { groups }
    }

    /// Ids of `key` in order; empty for unknown groups.
    #[must_use]
    pub fn group(&self, key: GroupKey) -> &[TaskId] {
        self.groups.get(&key).map_or(&[], Vec::as_slice)
    }

    /// Non-empty groups in key order.
    pub fn groups(&self) -> impl Iterator<Item = (GroupKey, &[TaskId])> {
        self.groups
            .iter()
            .map(|(key, ids)| (*key, ids.as_slice()))
    }

    /// Group and index of `task`.
    #[must_use]
    pub fn locate(&self, task: TaskId) -> Option<(GroupKey, usize)> {
        self.groups.iter().find_map(|(key, ids)| {
            ids.iter()
                .position(|id| *id == task)
                .map(|index| (*key, index))
        })
    }

    /// Turn a drag release into a move instruction.
    ///
    /// # Errors
    /// Fails when the dragged task or the task it was dropped on is unknown.
    pub fn resolve_drop(&self, task: TaskId, target: DropTarget) -> Result<MoveInstruction, OrderingError> {
        let (source, _) = self.locate(task).ok_or(OrderingError::UnknownTask(task))?;
        let (target, target_index) = match target {
            DropTarget::Task(over) => self.locate(over).ok_or(OrderingError::UnknownTask(over))?,
            DropTarget::Group(key) => (key, 0),
            DropTarget::Slot { group, index } => (group, index),
        };
        Ok(MoveInstruction {
            task,
            source,
            target,
            target_index,
        })
    }

    /// Position a newly inserted task of `key` receives.
    #[must_use]
    pub fn append_index(&self, key: GroupKey) -> u32 {
        position(self.group(key).len())
    }

    /// Dense update set for every task of `key`.
    #[must_use]
    pub fn normalize(&self, key: GroupKey) -> Vec<ReorderUpdate> {
        dense_updates(key, self.group(key))
    }
}

/// Ordering of tasks within a group.
pub(crate) fn group_order(a: &Task, b: &Task) -> Ordering {
    a.sort_order
        .cmp(&b.sort_order)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

fn position(index: usize) -> u32 {
    u32::try_from(index).unwrap_or(u32::MAX)
}

fn dense_updates(key: GroupKey, ids: &[TaskId]) -> Vec<ReorderUpdate> {
    ids.iter()
        .enumerate()
        .map(|(index, id)| ReorderUpdate {
            id: *id,
            sort_order: position(index),
            category_id: key.category_id(),
        })
        .collect()
}

/// Updates produced by one move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePlan {
    /// The move, with its index clamped.
    pub instruction: MoveInstruction,
    /// Full dense assignment of the source group followed by the target group.
    pub updates: Vec<ReorderUpdate>,
}

/// Compute the dense ordering after `instruction`.
///
/// Returns `Ok(None)` when the move leaves every position unchanged.
///
/// # Errors
/// Fails when the task is not in `instruction.source`.
pub fn plan_move(grouped: &GroupedLists, instruction: MoveInstruction) -> Result<Option<MovePlan>, OrderingError> {
    let MoveInstruction {
        task,
        source,
        target,
        target_index,
    } = instruction;
    let mut source_ids = grouped.group(source).to_vec();
    let from = source_ids
        .iter()
        .position(|id| *id == task)
        .ok_or(OrderingError::NotInGroup { task, group: source })?;
    source_ids.remove(from);

    if source == target {
        let index = target_index.min(source_ids.len());
        if index == from {
            return Ok(None);
        }
        source_ids.insert(index, task);
        return Ok(Some(MovePlan {
            instruction: MoveInstruction {
                target_index: index,
                ..instruction
            },
            updates: dense_updates(source, &source_ids),
        }));
    }

    let mut target_ids = grouped.group(target).to_vec();
    let index = target_index.min(target_ids.len());
    target_ids.insert(index, task);
    let mut updates = dense_updates(source, &source_ids);
    updates.extend(dense_updates(target, &target_ids));
    Ok(Some(MovePlan {
        instruction: MoveInstruction {
            target_index: index,
            ..instruction
        },
        updates,
    }))
}

/// Write reorder results into a task list, re-joining categories.
///
/// Returns the number of tasks touched; ids not in `tasks` are ignored.
pub fn apply_updates(tasks: &mut [Task], updates: &[ReorderUpdate], categories: &[Category]) -> usize {
    let mut touched = 0;
    for update in updates {
        let Some(task) = tasks.iter_mut().find(|task| task.id == update.id) else {
            continue;
        };
        task.sort_order = update.sort_order;
        if task.category_id != update.category_id {
            task.category_id = update.category_id;
            task.category = update
                .category_id
                .and_then(|id| categories.iter().find(|category| category.id == id))
                .cloned();
        }
        touched += 1;
    }
    touched
}

/// Whether the stored `sort_order` values of `key` are exactly `0..len`.
#[must_use]
pub fn is_dense(tasks: &[Task], key: GroupKey) -> bool {
    let mut orders: Vec<u32> = tasks
        .iter()
        .filter(|task| task.group_key() == key)
        .map(|task| task.sort_order)
        .collect();
    orders.sort_unstable();
    orders.iter().enumerate().all(|(index, order)| position(index) == *order)
}
