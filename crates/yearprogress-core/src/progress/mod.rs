//! Progress engine.
//!
//! Combines the period model and the recurrence expander into immutable
//! [`ProgressSnapshot`]s. [`compute_snapshot`] is a pure function of its
//! arguments: it reads no clock and keeps no state, so it can be called from
//! any number of refresh tasks at once.

mod format;

pub use format::{format_time_left, ordinal_suffix, MAX_DECIMAL_DIGITS};

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::event::Event;
use crate::period::{CalendarPeriod, Interval};
use crate::recurrence::next_occurrence;
use format::FixedPercent;

/// Which side of the progress is foregrounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalculationType {
    /// Progress so far.
    #[default]
    Elapsed,
    /// Progress left.
    Remaining,
}

impl fmt::Display for CalculationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalculationType::Elapsed => f.write_str("elapsed"),
            CalculationType::Remaining => f.write_str("remaining"),
        }
    }
}

impl FromStr for CalculationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "elapsed" => Ok(CalculationType::Elapsed),
            "remaining" => Ok(CalculationType::Remaining),
            other => Err(format!("unknown calculation type: {other}")),
        }
    }
}

/// Read-only settings snapshot for one computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// 0 = Sunday .. 6 = Saturday.
    pub week_start_day: u8,
    pub decimal_digits: u8,
    pub calculation_type: CalculationType,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            week_start_day: 0,
            decimal_digits: 2,
            calculation_type: CalculationType::Elapsed,
        }
    }
}

impl ProgressConfig {
    pub fn with_decimal_digits(mut self, digits: u8) -> Self {
        self.decimal_digits = digits;
        self
    }
}

/// What a snapshot is computed for.
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    Period(CalendarPeriod),
    Event(&'a Event),
}

impl Subject<'_> {
    /// Stable identifier, e.g. `week` or `event:7`.
    pub fn id(&self) -> String {
        match self {
            Subject::Period(period) => period.as_str().to_string(),
            Subject::Event(event) => format!("event:{}", event.id),
        }
    }
}

/// Immutable result of one progress computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub subject_id: String,
    /// Period name ("27th", "Sep") or event title.
    pub title: String,
    /// In `[0, 1]`.
    pub elapsed_fraction: f64,
    pub elapsed_label: String,
    pub remaining_label: String,
    /// The label selected by the configured [`CalculationType`].
    pub headline_label: String,
    pub time_left_label: String,
    pub interval: Interval,
    pub computed_at: DateTime<Utc>,
}

/// Compute the progress of `subject` at `now`.
///
/// Calendar periods never fail. Events fail only when their recurrence rule
/// cannot be expanded.
///
/// # Errors
/// Returns [`crate::CoreError::InvalidRecurrence`] for malformed rules.
pub fn compute_snapshot<Tz: TimeZone>(
    subject: Subject<'_>,
    now: &DateTime<Tz>,
    config: &ProgressConfig,
) -> Result<ProgressSnapshot>
where
    Tz::Offset: fmt::Display,
{
    let (interval, title) = match subject {
        Subject::Period(period) => (
            period.resolve(now, config.week_start_day),
            period.current_label(now),
        ),
        Subject::Event(event) => (next_occurrence(event, now)?, event.title.clone()),
    };

    let fraction = interval.elapsed_fraction(now);
    let elapsed = FixedPercent::from_fraction(fraction, config.decimal_digits);
    let elapsed_label = elapsed.label();
    let remaining_label = elapsed.complement().label();
    let headline_label = match config.calculation_type {
        CalculationType::Elapsed => elapsed_label.clone(),
        CalculationType::Remaining => remaining_label.clone(),
    };

    Ok(ProgressSnapshot {
        subject_id: subject.id(),
        title,
        elapsed_fraction: fraction,
        elapsed_label,
        remaining_label,
        headline_label,
        time_left_label: format_time_left(interval.remaining(now)),
        interval,
        computed_at: now.with_timezone(&Utc),
    })
}
