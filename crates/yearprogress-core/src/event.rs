//! User-defined events tracked alongside the calendar periods.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::period::Interval;
use crate::recurrence::RecurrenceRule;

/// A personal event. Owned by the event store; the engine only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Assigned by the store on creation; 0 until then.
    #[serde(default)]
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Display hint: the event covers whole days.
    #[serde(default)]
    pub all_day: bool,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub recurrence: Option<RecurrenceRule>,
}

impl Event {
    /// A one-shot event that has not been stored yet.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            title: title.into(),
            description: description.into(),
            all_day: false,
            start_time,
            end_time,
            recurrence: None,
        }
    }

    pub fn with_recurrence(mut self, rule: RecurrenceRule) -> Self {
        self.recurrence = Some(rule);
        self
    }

    /// Check `start_time <= end_time`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.end_time < self.start_time {
            return Err(ValidationError::InvalidTimeRange {
                start: self.start_time,
                end: self.end_time,
            });
        }
        if self.title.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "title".into(),
                message: "must not be empty".into(),
            });
        }
        Ok(())
    }

    /// The event's own (first) occurrence.
    pub fn interval(&self) -> Interval {
        Interval::clamped(self.start_time, self.end_time)
    }

    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    /// Case-sensitive substring match on title or description.
    pub fn matches(&self, needle: &str) -> bool {
        self.title.contains(needle) || self.description.contains(needle)
    }
}
