//! Recurrence expansion.
//!
//! Given an event and a reference instant, [`next_occurrence`] returns the
//! interval whose progress should be shown. Occurrences keep the event's
//! original local time of day and duration, evaluated in the timezone of the
//! reference instant.

mod rule;

pub use rule::{RecurrenceRule, WeekdaySet};

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::error::{CoreError, Result};
use crate::event::Event;
use crate::period::calendar::{add_days, clamped_date, local_instant, shift_month};
use crate::period::Interval;

/// Months/years searched before giving up on a date-based rule.
const SEARCH_LIMIT: i32 = 4;

/// The parts of the original occurrence that every repetition keeps.
struct Template {
    time: NaiveTime,
    day: u32,
    month: u32,
    duration: Duration,
}

impl Template {
    fn occurrence_on<Tz: TimeZone>(&self, tz: &Tz, date: NaiveDate) -> Interval {
        let start = local_instant(tz, date.and_time(self.time));
        Interval::clamped(start, start + self.duration)
    }
}

/// Next occurrence of `event` relative to `after`.
///
/// - One-shot events always return their own interval, even when it is in
///   the past.
/// - Repeating events return their own interval until it has ended.
/// - Weekly: the earliest date on or after `after`'s date whose weekday is in
///   the set and whose occurrence has not ended yet.
/// - Monthly: the original day of month, clamped to the month length, in the
///   first month on or after `after`'s month whose occurrence ends at or after
///   `after`.
/// - Yearly: the original month and day (Feb 29 clamps to Feb 28).
///
/// # Errors
/// Returns [`CoreError::InvalidRecurrence`] for a weekly rule with no days.
pub fn next_occurrence<Tz: TimeZone>(event: &Event, after: &DateTime<Tz>) -> Result<Interval> {
    let own = event.interval();
    let Some(rule) = event.recurrence else {
        return Ok(own);
    };
    if let RecurrenceRule::Weekly { days } = rule {
        if days.is_empty() {
            return Err(CoreError::InvalidRecurrence(format!(
                "event {} repeats weekly on no days",
                event.id
            )));
        }
    }

    let after_utc = after.with_timezone(&Utc);
    if after_utc < own.end() {
        return Ok(own);
    }

    let tz = after.timezone();
    let local_start = event.start_time.with_timezone(&tz);
    let template = Template {
        time: local_start.time(),
        day: local_start.day(),
        month: local_start.month(),
        duration: own.duration(),
    };

    match rule {
        RecurrenceRule::Weekly { days } => Ok(weekly(&tz, &template, days, after)),
        RecurrenceRule::Monthly => monthly(&tz, &template, after)
            .ok_or_else(|| no_occurrence(event, "monthly", &after_utc)),
        RecurrenceRule::Yearly => yearly(&tz, &template, after)
            .ok_or_else(|| no_occurrence(event, "yearly", &after_utc)),
    }
}

fn no_occurrence(event: &Event, kind: &str, after: &DateTime<Utc>) -> CoreError {
    CoreError::InvalidRecurrence(format!(
        "event {} has no {kind} occurrence after {after}",
        event.id
    ))
}

fn weekly<Tz: TimeZone>(
    tz: &Tz,
    template: &Template,
    days: WeekdaySet,
    after: &DateTime<Tz>,
) -> Interval {
    let after_utc = after.with_timezone(&Utc);
    let today = after.date_naive();
    let mut last = None;
    for offset in 0..=7 {
        let date = add_days(today, offset);
        if !days.contains(date.weekday()) {
            continue;
        }
        let candidate = template.occurrence_on(tz, date);
        if after_utc < candidate.end() {
            return candidate;
        }
        last = Some(candidate);
    }
    // A non-empty set always matches within the next seven days.
    last.unwrap_or_else(|| template.occurrence_on(tz, add_days(today, 7)))
}

fn monthly<Tz: TimeZone>(tz: &Tz, template: &Template, after: &DateTime<Tz>) -> Option<Interval> {
    let after_utc = after.with_timezone(&Utc);
    (0..SEARCH_LIMIT).find_map(|offset| {
        let (year, month) = shift_month(after.year(), after.month(), offset);
        let date = clamped_date(year, month, template.day)?;
        let candidate = template.occurrence_on(tz, date);
        (candidate.end() >= after_utc).then_some(candidate)
    })
}

fn yearly<Tz: TimeZone>(tz: &Tz, template: &Template, after: &DateTime<Tz>) -> Option<Interval> {
    let after_utc = after.with_timezone(&Utc);
    (0..SEARCH_LIMIT).find_map(|offset| {
        let date = clamped_date(after.year() + offset, template.month, template.day)?;
        let candidate = template.occurrence_on(tz, date);
        (candidate.end() >= after_utc).then_some(candidate)
    })
}
