//! Next-fire arithmetic.
//!
//! Fire times are always derived from the current clock and the subject's
//! next natural boundary, never from the previous fire time, so missed
//! wake-ups do not accumulate drift.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};

use crate::period::Interval;

/// Cadences longer than a leap year are treated as one.
const MAX_CADENCE_DAYS: i64 = 366;

/// `min(now + cadence, boundary)`, ignoring a boundary that is not in the future.
pub fn next_fire_at(
    now: DateTime<Utc>,
    cadence: StdDuration,
    boundary: Option<DateTime<Utc>>,
) -> DateTime<Utc> {
    let max = Duration::days(MAX_CADENCE_DAYS);
    let cadence = Duration::from_std(cadence).unwrap_or(max).min(max);
    let by_cadence = now + cadence;
    match boundary {
        Some(boundary) if boundary > now => by_cadence.min(boundary),
        _ => by_cadence,
    }
}

/// The next instant at which an event's progress changes shape: its start
/// while upcoming, its end while running, none once it is over.
pub fn event_boundary(occurrence: &Interval, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if now < occurrence.start() {
        Some(occurrence.start())
    } else if now < occurrence.end() {
        Some(occurrence.end())
    } else {
        None
    }
}
