//! Recurrence decisions: when a completed task reopens, when it is purged,
//! and whether a recurring task is visible today.
//!
//! Every function here is pure and total. Unparsable timestamps make the rule
//! not apply: reset and delete answer `false`, visibility answers `true`.

use time::OffsetDateTime;

use crate::clock::Zone;
use crate::task::{RecurrencePattern, Task};
use crate::temporal::{AUTO_DELETE_AFTER, parse_instant, weekday_index};

/// Whether a completed daily task must be reopened at `now`.
///
/// True when the local calendar day of `completed_at` is strictly before the
/// local calendar day of `now`, so a task completed at 23:59 resets one minute
/// later at midnight.
#[must_use]
pub fn should_reset_daily<Z: Zone + ?Sized>(
    completed_at: Option<&str>,
    pattern: RecurrencePattern,
    now: OffsetDateTime,
    zone: &Z,
) -> bool {
    if pattern != RecurrencePattern::Daily {
        return false;
    }
    completed_at
        .and_then(|raw| parse_instant(raw, zone))
        .and_then(|completed| zone.local_date(completed).zip(zone.local_date(now)))
        .is_some_and(|(completed, today)| completed < today)
}

/// Whether a completed one-off task must be purged at `now`.
///
/// Elapsed time, not calendar days: the task goes once 24 hours have passed.
#[must_use]
pub fn should_auto_delete<Z: Zone + ?Sized>(
    completed_at: Option<&str>,
    pattern: RecurrencePattern,
    now: OffsetDateTime,
    zone: &Z,
) -> bool {
    if pattern != RecurrencePattern::None {
        return false;
    }
    completed_at
        .and_then(|raw| parse_instant(raw, zone))
        .and_then(|completed| completed.checked_add(AUTO_DELETE_AFTER))
        .is_some_and(|deadline| now >= deadline)
}

/// Whether a task is listed at `now`.
///
/// Only weekly tasks pinned to a weekday are ever hidden; completion state
/// never affects visibility, and neither does `due_date`.
#[must_use]
pub fn should_show<Z: Zone + ?Sized>(
    _due_date: Option<&str>,
    _completed_at: Option<&str>,
    pattern: RecurrencePattern,
    weekly_day: Option<u8>,
    now: OffsetDateTime,
    zone: &Z,
) -> bool {
    match (pattern, weekly_day) {
        (RecurrencePattern::Weekly, Some(day)) => {
            weekday_index(now, zone).is_none_or(|today| today == day)
        }
        _ => true,
    }
}

/// Outcome of evaluating one task during a maintenance run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceAction {
    /// Leave the task alone.
    Keep,
    /// Clear `completed_at`.
    Reset,
    /// Delete the task.
    Delete,
}

/// Decide what a maintenance run does with `task`.
///
/// Reset only applies to daily tasks and delete only to one-off tasks, so a
/// task never qualifies for both.
#[must_use]
pub fn maintenance_action<Z: Zone + ?Sized>(
    task: &Task,
    now: OffsetDateTime,
    zone: &Z,
) -> MaintenanceAction {
    let completed = task.completed_at.as_deref();
    let pattern = task.pattern();
    if should_reset_daily(completed, pattern, now, zone) {
        MaintenanceAction::Reset
    } else if should_auto_delete(completed, pattern, now, zone) {
        MaintenanceAction::Delete
    } else {
        MaintenanceAction::Keep
    }
}

impl Task {
    /// Visibility of this task at `now`.
    #[must_use]
    pub fn is_visible<Z: Zone + ?Sized>(&self, now: OffsetDateTime, zone: &Z) -> bool {
        should_show(
            self.due_date.as_deref(),
            self.completed_at.as_deref(),
            self.pattern(),
            self.weekly_day(),
            now,
            zone,
        )
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use crate::id::{TaskId, UserId};
    use crate::task::Recurrence;
    use time::macros::{datetime, offset};
    use time::{Duration, UtcOffset};

    const ZONE: UtcOffset = offset!(+2);

    fn completed(pattern: RecurrencePattern, completed_at: &str) -> Task {
        Task {
            id: TaskId::new(),
            user_id: UserId::new(),
            category_id: None,
            title: "task".into(),
            notes: None,
            due_date: None,
            due_time: None,
            start_time: None,
            end_time: None,
            completed_at: Some(completed_at.into()),
            sort_order: 0,
            created_at: datetime!(2023-12-01 0:00 UTC),
            recurrence: Some(Recurrence {
                pattern,
                weekly_day: None,
            }),
            category: None,
        }
    }

    #[test]
    fn daily_resets_at_local_midnight_not_after_24h() {
        let done = Some("2024-01-01T23:59:00+02:00");
        let daily = RecurrencePattern::Daily;
        assert!(should_reset_daily(done, daily, datetime!(2024-01-02 00:01 +2), &ZONE));
        assert!(!should_reset_daily(done, daily, datetime!(2024-01-01 23:59:30 +2), &ZONE));
    }

    #[test]
    fn daily_reset_uses_local_day_not_utc_day() {
        // Completed 23:30 local on Jan 1; now is 00:30 local on Jan 2 but still
        // Jan 1 in UTC.
        let done = Some("2024-01-01T21:30:00Z");
        let now = datetime!(2024-01-01 22:30 UTC);
        assert!(should_reset_daily(done, RecurrencePattern::Daily, now, &ZONE));
        assert!(!should_reset_daily(done, RecurrencePattern::Daily, now, &UtcOffset::UTC));
    }

    #[test]
    fn reset_and_delete_ignore_other_patterns() {
        let done = Some("2020-01-01T00:00:00Z");
        let now = datetime!(2024-01-01 0:00 UTC);
        for pattern in [RecurrencePattern::None, RecurrencePattern::Weekly] {
            assert!(!should_reset_daily(done, pattern, now, &ZONE));
        }
        for pattern in [RecurrencePattern::Daily, RecurrencePattern::Weekly] {
            assert!(!should_auto_delete(done, pattern, now, &ZONE));
        }
    }

    #[test]
    fn delete_threshold_is_elapsed_24_hours() {
        let now = datetime!(2024-06-10 12:00 UTC);
        let format = |instant: OffsetDateTime| crate::temporal::format_instant(instant).expect("format");
        let old = format(now - Duration::hours(24) - Duration::seconds(1));
        let recent = format(now - Duration::hours(23) - Duration::minutes(59));
        assert!(should_auto_delete(Some(&old), RecurrencePattern::None, now, &ZONE));
        assert!(!should_auto_delete(Some(&recent), RecurrencePattern::None, now, &ZONE));
    }

    #[test]
    fn missing_or_malformed_completion_never_triggers() {
        let now = datetime!(2024-06-10 12:00 UTC);
        assert!(!should_reset_daily(None, RecurrencePattern::Daily, now, &ZONE));
        assert!(!should_auto_delete(None, RecurrencePattern::None, now, &ZONE));
        assert!(!should_reset_daily(Some("yesterday"), RecurrencePattern::Daily, now, &ZONE));
        assert!(!should_auto_delete(Some("yesterday"), RecurrencePattern::None, now, &ZONE));
    }

    #[test]
    fn completions_at_the_end_of_the_calendar_never_trigger() {
        let now = datetime!(2024-01-01 0:00 UTC);
        for raw in ["9999-12-31T23:00:00Z", "9999-12-31T23:00:00-05:00"] {
            assert!(parse_instant(raw, &ZONE).is_some());
            assert!(!should_auto_delete(Some(raw), RecurrencePattern::None, now, &ZONE));
            assert!(!should_reset_daily(Some(raw), RecurrencePattern::Daily, now, &ZONE));
            for pattern in [RecurrencePattern::None, RecurrencePattern::Daily] {
                assert_eq!(
                    maintenance_action(&completed(pattern, raw), now, &ZONE),
                    MaintenanceAction::Keep
                );
            }
        }

        let last_hour = datetime!(9999-12-31 23:00 UTC);
        assert!(should_show(None, None, RecurrencePattern::Weekly, Some(1), last_hour, &ZONE));
    }

    #[test]
    fn weekly_visibility_follows_local_weekday() {
        // 2024-01-03 is a Wednesday.
        let weekly = RecurrencePattern::Weekly;
        let wednesday = datetime!(2024-01-03 09:00 +2);
        let thursday = datetime!(2024-01-04 09:00 +2);
        for completed_at in [None, Some("2023-12-27T10:00:00Z")] {
            assert!(should_show(None, completed_at, weekly, Some(3), wednesday, &ZONE));
            assert!(!should_show(None, completed_at, weekly, Some(3), thursday, &ZONE));
        }
        assert!(should_show(None, None, weekly, None, thursday, &ZONE));
        assert!(should_show(None, None, weekly, Some(0), datetime!(2024-01-07 12:00 +2), &ZONE));
    }

    #[test]
    fn non_weekly_tasks_are_always_shown() {
        let now = datetime!(2024-01-04 09:00 UTC);
        let done = Some("2024-01-01T00:00:00Z");
        assert!(should_show(Some("garbage"), done, RecurrencePattern::None, None, now, &ZONE));
        assert!(should_show(None, done, RecurrencePattern::Daily, Some(3), now, &ZONE));
    }

    #[test]
    fn maintenance_scenarios() {
        let daily = completed(RecurrencePattern::Daily, "2024-01-01T23:00:00+02:00");
        assert_eq!(
            maintenance_action(&daily, datetime!(2024-01-02 00:05 +2), &ZONE),
            MaintenanceAction::Reset
        );

        let once = completed(RecurrencePattern::None, "2024-01-01T10:00:00+02:00");
        assert_eq!(
            maintenance_action(&once, datetime!(2024-01-02 10:00:01 +2), &ZONE),
            MaintenanceAction::Delete
        );
        assert_eq!(
            maintenance_action(&once, datetime!(2024-01-02 09:59:59 +2), &ZONE),
            MaintenanceAction::Keep
        );

        let weekly = completed(RecurrencePattern::Weekly, "2023-01-01T00:00:00Z");
        assert_eq!(
            maintenance_action(&weekly, datetime!(2024-01-02 0:00 UTC), &ZONE),
            MaintenanceAction::Keep
        );
    }

    #[test]
    fn offsetless_completion_is_local_time() {
        let daily = completed(RecurrencePattern::Daily, "2024-01-01T23:00");
        assert_eq!(
            maintenance_action(&daily, datetime!(2024-01-02 00:05 +2), &ZONE),
            MaintenanceAction::Reset
        );
        assert_eq!(
            maintenance_action(&daily, datetime!(2024-01-01 23:30 +2), &ZONE),
            MaintenanceAction::Keep
        );
    }
}
