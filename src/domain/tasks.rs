//! Task normalization and statistics.

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};
use todolist_api_types::{StatisticsView, TaskInput};

use crate::domain::entities::TaskRecord;
use crate::domain::error::DomainError;
use crate::domain::types::Priority;

/// A task ready to be written, derived from loosely typed page input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub name: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub deadline: Option<Date>,
    pub tags: Vec<String>,
    pub completed: bool,
    pub created_at: OffsetDateTime,
}

impl TaskDraft {
    /// Missing fields take defaults: medium priority, no deadline, no tags,
    /// open, created `now`.
    pub fn from_input(input: TaskInput, now: OffsetDateTime) -> Result<Self, DomainError> {
        let name = input
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or(DomainError::MissingName)?
            .to_string();

        let priority = match non_empty(input.priority.as_deref()) {
            Some(raw) => Priority::parse(raw)
                .ok_or_else(|| DomainError::UnknownPriority(raw.to_string()))?,
            None => Priority::default(),
        };

        let deadline = match non_empty(input.deadline.as_deref()) {
            Some(raw) => Some(parse_deadline(raw)?),
            None => None,
        };

        let created_at = match non_empty(input.created_at.as_deref()) {
            Some(raw) => parse_timestamp(raw)?,
            None => now,
        };

        let tags = input
            .tags
            .unwrap_or_default()
            .into_iter()
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect();

        Ok(Self {
            name,
            description: input.description.filter(|value| !value.is_empty()),
            priority,
            deadline,
            tags,
            completed: input.completed.unwrap_or(false),
            created_at,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Accepts `YYYY-MM-DD` or a full timestamp whose date part is used.
pub fn parse_deadline(raw: &str) -> Result<Date, DomainError> {
    let date_part = raw.get(..10).unwrap_or(raw);
    Date::parse(date_part, format_description!("[year]-[month]-[day]"))
        .map_err(|_| DomainError::InvalidDeadline(raw.to_string()))
}

/// RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS` taken as UTC, or a bare date at
/// midnight UTC.
pub fn parse_timestamp(raw: &str) -> Result<OffsetDateTime, DomainError> {
    if let Ok(parsed) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(parsed);
    }
    if let Ok(parsed) = PrimitiveDateTime::parse(
        raw,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Ok(parsed.assume_utc());
    }
    if let Ok(date) = Date::parse(raw, format_description!("[year]-[month]-[day]")) {
        return Ok(date.midnight().assume_utc());
    }
    Err(DomainError::InvalidTimestamp(raw.to_string()))
}

/// Counts over a user's tasks. Overdue means open with a deadline before
/// `today`; the completion rate is a rounded percentage.
pub fn statistics(tasks: &[TaskRecord], today: Date) -> StatisticsView {
    let total = tasks.len() as i64;
    let completed = tasks.iter().filter(|task| task.completed).count() as i64;
    let overdue = tasks.iter().filter(|task| task.is_overdue(today)).count() as i64;
    statistics_from_counts(total, completed, total - completed, overdue)
}

pub fn statistics_from_counts(total: i64, completed: i64, active: i64, overdue: i64) -> StatisticsView {
    let completion_rate = if total > 0 {
        ((completed as f64 / total as f64) * 100.0).round() as i64
    } else {
        0
    };
    StatisticsView {
        total,
        completed,
        active,
        overdue,
        completion_rate,
    }
}
