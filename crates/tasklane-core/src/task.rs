use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Date, OffsetDateTime};

use crate::id::{CategoryId, TaskId, UserId};
use crate::temporal::{parse_date, parse_time_of_day};

/// Recurrence kind of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrencePattern {
    /// One-off task, purged 24 hours after completion.
    #[default]
    None,
    /// Reopened at the first local midnight after completion.
    Daily,
    /// Shown on its weekday only (or always without one); never reopened.
    Weekly,
}

impl RecurrencePattern {
    /// String representation used in storage and on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
        }
    }
}

impl fmt::Display for RecurrencePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecurrencePattern {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Self::None),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            other => Err(ValidationError::UnknownPattern(other.to_owned())),
        }
    }
}

/// Recurrence settings owned by a task (zero or one per task).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    /// Recurrence kind.
    pub pattern: RecurrencePattern,
    /// Weekday (`0` = Sunday … `6` = Saturday) for weekly tasks; `None` shows every day.
    #[serde(default)]
    pub weekly_day: Option<u8>,
}

impl Recurrence {
    /// Recurrence that never repeats.
    pub const NONE: Self = Self {
        pattern: RecurrencePattern::None,
        weekly_day: None,
    };

    /// Daily recurrence.
    #[must_use]
    pub const fn daily() -> Self {
        Self {
            pattern: RecurrencePattern::Daily,
            weekly_day: None,
        }
    }

    /// Weekly recurrence pinned to `weekday` (or unpinned when `None`).
    #[must_use]
    pub const fn weekly(weekday: Option<u8>) -> Self {
        Self {
            pattern: RecurrencePattern::Weekly,
            weekly_day: weekday,
        }
    }

    /// Drop a weekday that has no meaning for the pattern.
    #[must_use]
    pub const fn normalized(self) -> Self {
        match self.pattern {
            RecurrencePattern::Weekly => self,
            pattern => Self {
                pattern,
                weekly_day: None,
            },
        }
    }
}

/// User-defined grouping of tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Identifier.
    pub id: CategoryId,
    /// Display name.
    pub name: String,
    /// CSS-style color (`#rrggbb`).
    #[serde(default)]
    pub color: Option<String>,
    /// Creation timestamp; categories are listed in creation order.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Palette offered when creating categories; the first entry is the default.
pub const CATEGORY_COLORS: [&str; 16] = [
    "#b91c1c", "#c2410c", "#b45309", "#a16207", "#4d7c0f", "#15803d", "#047857", "#0f766e",
    "#0e7490", "#0369a1", "#1e40af", "#4338ca", "#6d28d9", "#7e22ce", "#a21caf", "#be185d",
];

/// Color used for tasks without a colored category.
pub const DEFAULT_TASK_COLOR: &str = "#3b82f6";

/// Key of the group a task is ordered within.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupKey {
    /// Tasks of one category.
    Category(CategoryId),
    /// Tasks without a category.
    Uncategorized,
}

impl GroupKey {
    /// Category id stored on tasks of this group.
    #[must_use]
    pub const fn category_id(self) -> Option<CategoryId> {
        match self {
            Self::Category(id) => Some(id),
            Self::Uncategorized => None,
        }
    }
}

impl From<Option<CategoryId>> for GroupKey {
    fn from(value: Option<CategoryId>) -> Self {
        value.map_or(Self::Uncategorized, Self::Category)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Category(id) => id.fmt(f),
            Self::Uncategorized => f.write_str("uncategorized"),
        }
    }
}

impl FromStr for GroupKey {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("uncategorized") {
            return Ok(Self::Uncategorized);
        }
        s.parse().map(Self::Category)
    }
}

/// Task row joined with its recurrence and category.
///
/// Scheduling columns stay in their stored text form; see [`crate::temporal`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Identifier.
    pub id: TaskId,
    /// Owning user.
    pub user_id: UserId,
    /// Category, if any. Deleting the category detaches the task.
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    /// Non-empty title.
    pub title: String,
    /// Free-form notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// Due date (`YYYY-MM-DD`, local).
    #[serde(default)]
    pub due_date: Option<String>,
    /// Due time of day (`HH:MM[:SS]`), meaningful with a due date.
    #[serde(default)]
    pub due_time: Option<String>,
    /// Start of the calendar time block.
    #[serde(default)]
    pub start_time: Option<String>,
    /// End of the calendar time block, strictly after `start_time`.
    #[serde(default)]
    pub end_time: Option<String>,
    /// Completion timestamp (RFC 3339); presence means completed.
    #[serde(default)]
    pub completed_at: Option<String>,
    /// Dense position within the task's group.
    #[serde(default)]
    pub sort_order: u32,
    /// Creation timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Joined recurrence row.
    #[serde(default)]
    pub recurrence: Option<Recurrence>,
    /// Joined category row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
}

impl Task {
    /// Whether the task is currently marked complete.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Recurrence pattern, `none` when no recurrence row exists.
    #[must_use]
    pub fn pattern(&self) -> RecurrencePattern {
        self.recurrence.map(|r| r.pattern).unwrap_or_default()
    }

    /// Weekday of a weekly recurrence.
    #[must_use]
    pub fn weekly_day(&self) -> Option<u8> {
        self.recurrence.and_then(|r| r.weekly_day)
    }

    /// Whether the task repeats.
    #[must_use]
    pub fn is_recurring(&self) -> bool {
        self.pattern() != RecurrencePattern::None
    }

    /// Group the task is ordered within.
    #[must_use]
    pub fn group_key(&self) -> GroupKey {
        self.category_id.into()
    }

    /// Editable fields as currently stored, the starting point of an edit.
    #[must_use]
    pub fn fields(&self) -> TaskFields {
        TaskFields {
            title: self.title.clone(),
            notes: self.notes.clone(),
            category_id: self.category_id,
            due_date: self.due_date.clone(),
            due_time: self.due_time.clone(),
            start_time: self.start_time.clone(),
            end_time: self.end_time.clone(),
            recurrence: self.recurrence.unwrap_or_default(),
        }
    }
}

/// Rejected task or category input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Title is empty after trimming.
    #[error("title is required")]
    EmptyTitle,
    /// Category name is empty after trimming.
    #[error("category name is required")]
    EmptyCategoryName,
    /// A date column is not `YYYY-MM-DD`.
    #[error("invalid {field} '{value}', expected YYYY-MM-DD")]
    InvalidDate {
        /// Column name.
        field: &'static str,
        /// Offending value.
        value: String,
    },
    /// A time column is not `HH:MM[:SS]`.
    #[error("invalid {field} '{value}', expected HH:MM")]
    InvalidTime {
        /// Column name.
        field: &'static str,
        /// Offending value.
        value: String,
    },
    /// End of time block given without a start.
    #[error("end time requires a start time")]
    EndWithoutStart,
    /// End of time block not after its start.
    #[error("end time must be after start time")]
    EndNotAfterStart,
    /// Weekday outside `0..=6`.
    #[error("weekly day must be between 0 (Sunday) and 6 (Saturday), got {0}")]
    WeeklyDayOutOfRange(u8),
    /// Unknown recurrence keyword.
    #[error("unknown recurrence pattern '{0}'")]
    UnknownPattern(String),
}

/// User-editable task fields shared by create and edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFields {
    /// Title.
    pub title: String,
    /// Notes.
    pub notes: Option<String>,
    /// Category.
    pub category_id: Option<CategoryId>,
    /// Due date.
    pub due_date: Option<String>,
    /// Due time.
    pub due_time: Option<String>,
    /// Time block start.
    pub start_time: Option<String>,
    /// Time block end.
    pub end_time: Option<String>,
    /// Recurrence settings.
    pub recurrence: Recurrence,
}

impl TaskFields {
    /// Trim text, blank-to-`None`, and default the due date to `today` when a
    /// due time or time block is given without one.
    #[must_use]
    pub fn normalized(self, today: Date) -> Self {
        let blank = |value: Option<String>| {
            value
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };
        let due_time = blank(self.due_time);
        let start_time = blank(self.start_time);
        let mut due_date = blank(self.due_date);
        if due_date.is_none() && (due_time.is_some() || start_time.is_some()) {
            due_date = Some(today.to_string());
        }
        Self {
            title: self.title.trim().to_owned(),
            notes: blank(self.notes),
            category_id: self.category_id,
            due_date,
            due_time,
            start_time,
            end_time: blank(self.end_time),
            recurrence: self.recurrence.normalized(),
        }
    }

    /// Check the field invariants.
    ///
    /// # Errors
    /// Returns the first violated rule.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        if let Some(value) = self.due_date.as_deref()
            && parse_date(value).is_none()
        {
            return Err(ValidationError::InvalidDate {
                field: "due date",
                value: value.to_owned(),
            });
        }
        check_time("due time", self.due_time.as_deref())?;
        let start = check_time("start time", self.start_time.as_deref())?;
        let end = check_time("end time", self.end_time.as_deref())?;
        match (start, end) {
            (None, Some(_)) => return Err(ValidationError::EndWithoutStart),
            (Some(start), Some(end)) if end <= start => {
                return Err(ValidationError::EndNotAfterStart);
            }
            _ => {}
        }
        if let Some(day) = self.recurrence.weekly_day
            && day > 6
        {
            return Err(ValidationError::WeeklyDayOutOfRange(day));
        }
        Ok(())
    }
}

fn check_time(field: &'static str, value: Option<&str>) -> Result<Option<time::Time>, ValidationError> {
    value
        .map(|raw| {
            parse_time_of_day(raw).ok_or_else(|| ValidationError::InvalidTime {
                field,
                value: raw.to_owned(),
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    fn fields(title: &str) -> TaskFields {
        TaskFields {
            title: title.into(),
            ..TaskFields::default()
        }
    }

    #[test]
    fn pattern_defaults_to_none_without_recurrence_row() {
        let task = Task {
            id: TaskId::new(),
            user_id: UserId::new(),
            category_id: None,
            title: "t".into(),
            notes: None,
            due_date: None,
            due_time: None,
            start_time: None,
            end_time: None,
            completed_at: None,
            sort_order: 0,
            created_at: datetime!(2024-01-01 0:00 UTC),
            recurrence: None,
            category: None,
        };
        assert_eq!(task.pattern(), RecurrencePattern::None);
        assert!(!task.is_recurring());
        assert_eq!(task.group_key(), GroupKey::Uncategorized);
    }

    #[test]
    fn group_key_parses_sentinel_and_ids() {
        let id = CategoryId::new();
        assert_eq!("uncategorized".parse::<GroupKey>().ok(), Some(GroupKey::Uncategorized));
        assert_eq!(id.to_string().parse::<GroupKey>().ok(), Some(GroupKey::Category(id)));
        assert!("work".parse::<GroupKey>().is_err());
    }

    #[test]
    fn pattern_parses_case_insensitively() {
        assert_eq!("Daily".parse::<RecurrencePattern>(), Ok(RecurrencePattern::Daily));
        assert_eq!(
            "monthly".parse::<RecurrencePattern>(),
            Err(ValidationError::UnknownPattern("monthly".into()))
        );
    }

    #[test]
    fn normalization_defaults_due_date_for_timed_tasks() {
        let mut input = fields("  Standup ");
        input.start_time = Some("09:00".into());
        input.notes = Some("   ".into());
        let out = input.normalized(date!(2024-03-04));
        assert_eq!(out.title, "Standup");
        assert_eq!(out.notes, None);
        assert_eq!(out.due_date.as_deref(), Some("2024-03-04"));
    }

    #[test]
    fn weekday_is_dropped_for_non_weekly_patterns() {
        let mut input = fields("x");
        input.recurrence = Recurrence {
            pattern: RecurrencePattern::Daily,
            weekly_day: Some(3),
        };
        assert_eq!(input.normalized(date!(2024-01-01)).recurrence, Recurrence::daily());
    }

    #[test]
    fn validation_rules() {
        assert_eq!(fields("  ").validate(), Err(ValidationError::EmptyTitle));

        let mut block = fields("block");
        block.end_time = Some("10:00".into());
        assert_eq!(block.validate(), Err(ValidationError::EndWithoutStart));

        block.start_time = Some("10:00".into());
        assert_eq!(block.validate(), Err(ValidationError::EndNotAfterStart));

        block.end_time = Some("10:30".into());
        assert_eq!(block.validate(), Ok(()));

        let mut weekly = fields("gym");
        weekly.recurrence = Recurrence::weekly(Some(7));
        assert_eq!(weekly.validate(), Err(ValidationError::WeeklyDayOutOfRange(7)));

        let mut dated = fields("taxes");
        dated.due_date = Some("2024-13-01".into());
        assert!(matches!(dated.validate(), Err(ValidationError::InvalidDate { .. })));
    }
}
