use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CoreError, Result};

/// A half-open span of time `[start, end)` with `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl Interval {
    /// Create an interval, rejecting empty or inverted spans.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if end <= start {
            return Err(CoreError::ClockSkew { start, end });
        }
        Ok(Self { start, end })
    }

    /// Create an interval, widening a degenerate span to one second.
    ///
    /// Used where an interval comes from stored data (e.g. an event whose
    /// start equals its end) and must stay computable.
    pub fn clamped(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if end <= start {
            warn!(%start, %end, "degenerate interval, widening to one second");
            return Self {
                start,
                end: start + Duration::seconds(1),
            };
        }
        Self { start, end }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> bool {
        let at = at.with_timezone(&Utc);
        self.start <= at && at < self.end
    }

    /// Fraction of the interval that has passed at `now`, in `[0, 1]`.
    ///
    /// Returns 0 before the start and 1 at or after the end.
    pub fn elapsed_fraction<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> f64 {
        let now = now.with_timezone(&Utc);
        if now <= self.start {
            return 0.0;
        }
        if now >= self.end {
            return 1.0;
        }
        let total = (self.end - self.start).num_milliseconds();
        if total <= 0 {
            return 1.0;
        }
        let done = (now - self.start).num_milliseconds();
        (done as f64 / total as f64).clamp(0.0, 1.0)
    }

    /// Time left until the end, zero once the interval is over.
    pub fn remaining<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Duration {
        let now = now.with_timezone(&Utc);
        if now >= self.end {
            return Duration::zero();
        }
        if now <= self.start {
            return self.duration();
        }
        self.end - now
    }
}
