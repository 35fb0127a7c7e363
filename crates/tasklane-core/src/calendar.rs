//! Projection of scheduled tasks into calendar time blocks.

use time::{Date, Duration, OffsetDateTime};

use crate::clock::Zone;
use crate::id::TaskId;
use crate::task::{DEFAULT_TASK_COLOR, Task};
use crate::temporal::{combine, parse_date, parse_time_of_day};

/// Length of a block whose task has no end time.
pub const DEFAULT_BLOCK: Duration = Duration::minutes(30);

/// A task rendered on the calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeBlock {
    /// Source task.
    pub task: TaskId,
    /// Task title.
    pub title: String,
    /// Local start.
    pub start: OffsetDateTime,
    /// Local end.
    pub end: OffsetDateTime,
    /// Category color or the default task color.
    pub color: String,
}

impl TimeBlock {
    /// Calendar day the block starts on.
    #[must_use]
    pub const fn date(&self) -> Date {
        self.start.date()
    }
}

/// Blocks for every incomplete task with a due date and start time, by start.
///
/// Tasks whose date or times fail to parse are skipped.
#[must_use]
pub fn time_blocks<Z: Zone + ?Sized>(tasks: &[Task], zone: &Z) -> Vec<TimeBlock> {
    let mut blocks: Vec<TimeBlock> = tasks
        .iter()
        .filter(|task| !task.is_completed())
        .filter_map(|task| block_for(task, zone))
        .collect();
    blocks.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.title.cmp(&b.title)));
    blocks
}

fn block_for<Z: Zone + ?Sized>(task: &Task, zone: &Z) -> Option<TimeBlock> {
    let date = parse_date(task.due_date.as_deref()?)?;
    let start = combine(date, parse_time_of_day(task.start_time.as_deref()?)?, zone);
    let end = task
        .end_time
        .as_deref()
        .and_then(parse_time_of_day)
        .map(|time| combine(date, time, zone))
        .filter(|end| *end > start)
        .or_else(|| start.checked_add(DEFAULT_BLOCK))?;
    let color = task
        .category
        .as_ref()
        .and_then(|category| category.color.clone())
        .unwrap_or_else(|| DEFAULT_TASK_COLOR.to_owned());
    Some(TimeBlock {
        task: task.id,
        title: task.title.clone(),
        start,
        end,
        color,
    })
}
