//! Filtered list and grouped section views over a task snapshot.

use std::cmp::Ordering;

use time::OffsetDateTime;

use crate::clock::Zone;
use crate::ordering::group_order;
use crate::task::{Category, GroupKey, Task};

/// Filters applied to the flat task list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Only tasks of this group.
    pub group: Option<GroupKey>,
    /// Case-insensitive substring matched against title and notes.
    pub search: Option<String>,
}

impl ListQuery {
    fn matches(&self, task: &Task, needle: Option<&str>) -> bool {
        if self.group.is_some_and(|group| group != task.group_key()) {
            return false;
        }
        needle.is_none_or(|needle| {
            task.title.to_lowercase().contains(needle)
                || task
                    .notes
                    .as_deref()
                    .is_some_and(|notes| notes.to_lowercase().contains(needle))
        })
    }
}

/// Tasks matching `query` that are visible at `now`, in display order.
///
/// Incomplete tasks come first, then tasks with a due date and time, then by
/// due date (dated before undated), newest first on ties.
#[must_use]
pub fn visible_tasks<'a, Z: Zone + ?Sized>(
    tasks: &'a [Task],
    query: &ListQuery,
    now: OffsetDateTime,
    zone: &Z,
) -> Vec<&'a Task> {
    let needle = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);
    let mut visible: Vec<&Task> = tasks
        .iter()
        .filter(|task| query.matches(task, needle.as_deref()))
        .filter(|task| task.is_visible(now, zone))
        .collect();
    visible.sort_by(|a, b| display_order(a, b));
    visible
}

fn display_order(a: &Task, b: &Task) -> Ordering {
    let timed = |task: &Task| task.due_date.is_some() && task.due_time.is_some();
    a.is_completed()
        .cmp(&b.is_completed())
        .then_with(|| timed(b).cmp(&timed(a)))
        .then_with(|| match (&a.due_date, &b.due_date) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| b.created_at.cmp(&a.created_at))
}

/// One rendered group of the categorized view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSection<'a> {
    /// Group key.
    pub key: GroupKey,
    /// Category row, `None` for the uncategorized section.
    pub category: Option<&'a Category>,
    /// Members ordered by position.
    pub tasks: Vec<&'a Task>,
}

impl TaskSection<'_> {
    /// Heading shown for the section.
    #[must_use]
    pub fn title(&self) -> &str {
        self.category.map_or("Uncategorized", |category| category.name.as_str())
    }
}

/// Split `tasks` into sections: categories in creation order, then
/// uncategorized. Empty sections are omitted.
///
/// Tasks referencing a category missing from `categories` are listed under
/// uncategorized.
#[must_use]
pub fn group_tasks<'a, I>(tasks: I, categories: &'a [Category]) -> Vec<TaskSection<'a>>
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut ordered: Vec<&Category> = categories.iter().collect();
    ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

    let mut sections: Vec<TaskSection<'a>> = ordered
        .into_iter()
        .map(|category| TaskSection {
            key: GroupKey::Category(category.id),
            category: Some(category),
            tasks: Vec::new(),
        })
        .collect();
    let mut uncategorized = TaskSection {
        key: GroupKey::Uncategorized,
        category: None,
        tasks: Vec::new(),
    };

    for task in tasks {
        match sections.iter_mut().find(|section| section.key == task.group_key()) {
            Some(section) => section.tasks.push(task),
            None => uncategorized.tasks.push(task),
        }
    }
    sections.push(uncategorized);
    sections.retain(|section| !section.tasks.is_empty());
    for section in &mut sections {
        section.tasks.sort_by(|a, b| group_order(a, b));
    }
    sections
}
