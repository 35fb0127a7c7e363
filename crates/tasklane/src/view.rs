//! Plain-text rendering of tasks, sections and calendar blocks.

use std::fmt::{Display, Write as _};

use tasklane_app::{MaintenanceReport, SkipReason};
use tasklane_core::calendar::TimeBlock;
use tasklane_core::temporal::is_overdue;
use tasklane_core::{Category, RecurrencePattern, Task, TaskSection, Zone};
use time::{OffsetDateTime, Weekday};

/// Trailing characters of an id shown in listings; ids are accepted by suffix.
pub const SHORT_ID_LEN: usize = 8;

pub fn short_id(id: &impl Display) -> String {
    let text = id.to_string();
    let start = text.len().saturating_sub(SHORT_ID_LEN);
    text.get(start..).unwrap_or(&text).to_owned()
}

fn weekday_name(day: u8) -> String {
    Weekday::Sunday.nth_next(day).to_string()
}

fn repeat_label(task: &Task) -> String {
    match (task.pattern(), task.weekly_day()) {
        (RecurrencePattern::None, _) => "-".to_owned(),
        (RecurrencePattern::Weekly, Some(day)) => format!("weekly ({})", weekday_name(day)),
        (pattern, _) => pattern.to_string(),
    }
}

fn due_label<Z: Zone + ?Sized>(task: &Task, now: OffsetDateTime, zone: &Z) -> String {
    let Some(date) = task.due_date.as_deref() else {
        return "-".to_owned();
    };
    let mut label = date.to_owned();
    if let Some(time) = task.due_time.as_deref() {
        label.push(' ');
        label.push_str(time);
    }
    if !task.is_completed() && is_overdue(task.due_date.as_deref(), task.due_time.as_deref(), now, zone) {
        label.push_str(" (overdue)");
    }
    label
}

fn category_label(task: &Task) -> &str {
    task.category
        .as_ref()
        .map_or("-", |category| category.name.as_str())
}

pub fn render_task_table<Z: Zone + ?Sized>(tasks: &[&Task], now: OffsetDateTime, zone: &Z) -> String {
    let mut out = String::new();
    out.push_str("ID | Done | Title | Category | Due | Repeat\n");
    out.push_str("-- | ---- | ----- | -------- | --- | ------\n");
    for task in tasks {
        let _ = writeln!(
            out,
            "{} | {} | {} | {} | {} | {}",
            short_id(&task.id),
            if task.is_completed() { "x" } else { " " },
            task.title,
            category_label(task),
            due_label(task, now, zone),
            repeat_label(task),
        );
    }
    out
}

pub fn render_sections(sections: &[TaskSection<'_>]) -> String {
    let mut out = String::new();
    for (index, section) in sections.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "{} ({})", section.title(), section.tasks.len());
        for task in &section.tasks {
            let _ = writeln!(
                out,
                "  {:>2}. [{}] {}  {}",
                task.sort_order,
                if task.is_completed() { "x" } else { " " },
                task.title,
                short_id(&task.id),
            );
        }
    }
    out
}

pub fn render_time_blocks(blocks: &[TimeBlock]) -> String {
    let mut out = String::new();
    let mut current = None;
    for block in blocks {
        let date = block.date();
        if current != Some(date) {
            if current.is_some() {
                out.push('\n');
            }
            let _ = writeln!(out, "{date} {}", date.weekday());
            current = Some(date);
        }
        let _ = writeln!(
            out,
            "  {:02}:{:02}-{:02}:{:02}  {}  {}",
            block.start.hour(),
            block.start.minute(),
            block.end.hour(),
            block.end.minute(),
            block.title,
            block.color,
        );
    }
    out
}

pub fn render_categories(categories: &[Category], tasks: &[Task]) -> String {
    let mut out = String::new();
    out.push_str("ID | Name | Color | Tasks\n");
    out.push_str("-- | ---- | ----- | -----\n");
    for category in categories {
        let count = tasks
            .iter()
            .filter(|task| task.category_id == Some(category.id))
            .count();
        let _ = writeln!(
            out,
            "{} | {} | {} | {count}",
            short_id(&category.id),
            category.name,
            category.color.as_deref().unwrap_or("-"),
        );
    }
    out
}

pub fn render_report(report: &MaintenanceReport) -> String {
    if let Some(reason) = report.skipped {
        let why = match reason {
            SkipReason::SignedOut => "not signed in",
            SkipReason::TooSoon => "previous run too recent",
            SkipReason::FetchFailed => "completed tasks could not be fetched",
        };
        return format!("maintenance skipped: {why}");
    }
    let mut out = format!(
        "reset {} daily task(s), deleted {} completed task(s)",
        report.reset, report.deleted
    );
    if let Some(err) = &report.reset_error {
        let _ = write!(out, "\nreset failed: {err}");
    }
    if let Some(err) = &report.delete_error {
        let _ = write!(out, "\ndelete failed: {err}");
    }
    out
}

/// One-line status printed by `watch` after every change.
pub fn render_summary<Z: Zone + ?Sized>(tasks: &[Task], now: OffsetDateTime, zone: &Z) -> String {
    let done = tasks.iter().filter(|task| task.is_completed()).count();
    let overdue = tasks
        .iter()
        .filter(|task| !task.is_completed())
        .filter(|task| is_overdue(task.due_date.as_deref(), task.due_time.as_deref(), now, zone))
        .count();
    format!("{} open, {done} done, {overdue} overdue", tasks.len() - done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasklane_core::{CategoryId, GroupKey, Recurrence, TaskId, UserId};
    use time::macros::{datetime, offset};

    fn task(title: &str) -> Task {
        Task {
            id: TaskId::new(),
            user_id: UserId::default(),
            category_id: None,
            title: title.into(),
            notes: None,
            due_date: None,
            due_time: None,
            start_time: None,
            end_time: None,
            completed_at: None,
            sort_order: 0,
            created_at: datetime!(2024-05-01 8:00 UTC),
            recurrence: None,
            category: None,
        }
    }

    #[test]
    fn short_id_keeps_the_random_tail() {
        let id = TaskId::new();
        let short = short_id(&id);
        assert_eq!(short.len(), SHORT_ID_LEN);
        assert!(id.to_string().ends_with(&short));
    }

    #[test]
    fn table_marks_overdue_and_weekly_day() {
        let now = datetime!(2024-05-02 10:00 +2);
        let mut late = task("pay rent");
        late.due_date = Some("2024-05-01".into());
        let mut weekly = task("bins");
        weekly.recurrence = Some(Recurrence::weekly(Some(2)));
        let mut done = task("old");
        done.due_date = Some("2024-04-01".into());
        done.completed_at = Some("2024-04-01T09:00:00Z".into());

        let table = render_task_table(&[&late, &weekly, &done], now, &offset!(+2));
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[2].ends_with("| pay rent | - | 2024-05-01 (overdue) | -"));
        assert!(lines[3].ends_with("| bins | - | - | weekly (Tuesday)"));
        assert!(lines[4].contains("| x | old |"));
        assert!(!lines[4].contains("overdue"));
    }

    #[test]
    fn sections_list_positions_under_headings() {
        let category = Category {
            id: CategoryId::new(),
            name: "Home".into(),
            color: None,
            created_at: datetime!(2024-05-01 8:00 UTC),
        };
        let mut first = task("dishes");
        first.category_id = Some(category.id);
        let mut second = task("laundry");
        second.category_id = Some(category.id);
        second.sort_order = 1;
        let sections = vec![TaskSection {
            key: GroupKey::Category(category.id),
            category: Some(&category),
            tasks: vec![&first, &second],
        }];

        let text = render_sections(&sections);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Home (2)");
        assert!(lines[1].starts_with("   0. [ ] dishes"));
        assert!(lines[2].starts_with("   1. [ ] laundry"));
    }

    #[test]
    fn blocks_are_grouped_by_day() {
        let block = |title: &str, start: OffsetDateTime| TimeBlock {
            task: TaskId::new(),
            title: title.into(),
            start,
            end: start + time::Duration::minutes(30),
            color: "#3b82f6".into(),
        };
        let text = render_time_blocks(&[
            block("standup", datetime!(2024-05-01 9:00 +2)),
            block("review", datetime!(2024-05-01 14:30 +2)),
            block("gym", datetime!(2024-05-02 7:00 +2)),
        ]);
        assert_eq!(
            text,
            "2024-05-01 Wednesday\n  09:00-09:30  standup  #3b82f6\n  14:30-15:00  review  #3b82f6\n\n\
             2024-05-02 Thursday\n  07:00-07:30  gym  #3b82f6\n"
        );
    }

    #[test]
    fn report_lists_counts_and_failures() {
        let report = MaintenanceReport {
            reset: 2,
            deleted: 0,
            delete_error: Some("disk full".into()),
            ..MaintenanceReport::default()
        };
        assert_eq!(
            render_report(&report),
            "reset 2 daily task(s), deleted 0 completed task(s)\ndelete failed: disk full"
        );

        let skipped = MaintenanceReport {
            skipped: Some(SkipReason::SignedOut),
            ..MaintenanceReport::default()
        };
        assert_eq!(render_report(&skipped), "maintenance skipped: not signed in");
    }

    #[test]
    fn summary_counts_open_done_and_overdue() {
        let now = datetime!(2024-05-02 10:00 UTC);
        let mut late = task("late");
        late.due_date = Some("2024-05-01".into());
        let mut done = task("done");
        done.completed_at = Some("2024-05-02T09:00:00Z".into());
        let open = task("open");
        assert_eq!(
            render_summary(&[late, done, open], now, &offset!(UTC)),
            "2 open, 1 done, 1 overdue"
        );
    }
}
