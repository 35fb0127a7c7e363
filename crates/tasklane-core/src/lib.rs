//! Domain types and pure decision logic for tasklane.
//!
//! Nothing in this crate performs I/O: recurrence rules and dense ordering are
//! functions of a task snapshot and an injected [`clock::Clock`].

/// Calendar projection of scheduled tasks.
pub mod calendar;
pub mod clock;
/// Identifier types.
pub mod id;
pub mod listing;
pub mod ordering;
pub mod patch;
pub mod recurrence;
/// Task, category and recurrence model.
pub mod task;
pub mod temporal;

pub use clock::{Clock, FixedClock, SystemClock, Zone};
pub use id::{CategoryId, TaskId, UserId};
pub use listing::{ListQuery, TaskSection, group_tasks, visible_tasks};
pub use ordering::{DropTarget, GroupedLists, MoveInstruction, MovePlan, OrderingError, plan_move};
pub use patch::{CategoryPatch, FieldPatch, NewCategory, NewTask, ReorderUpdate, TaskPatch};
pub use recurrence::{MaintenanceAction, maintenance_action, should_auto_delete, should_reset_daily, should_show};
pub use task::{
    CATEGORY_COLORS, Category, DEFAULT_TASK_COLOR, GroupKey, Recurrence, RecurrencePattern, Task, TaskFields,
    ValidationError,
};
