//! Calendar periods and their resolution to concrete intervals.
//!
//! A [`CalendarPeriod`] carries no state. It only becomes an [`Interval`]
//! when resolved against a reference instant, whose timezone decides where
//! the local midnights fall.

pub mod calendar;
mod interval;

pub use calendar::weekday_from_index;
pub use interval::Interval;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use calendar::{add_days, first_of_next_month, start_of_day};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarPeriod {
    Day,
    Week,
    Month,
    Year,
}

impl CalendarPeriod {
    pub const ALL: [CalendarPeriod; 4] = [
        CalendarPeriod::Day,
        CalendarPeriod::Week,
        CalendarPeriod::Month,
        CalendarPeriod::Year,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CalendarPeriod::Day => "day",
            CalendarPeriod::Week => "week",
            CalendarPeriod::Month => "month",
            CalendarPeriod::Year => "year",
        }
    }

    /// Resolve the period containing `now`.
    ///
    /// `week_start_day` is 0 for Sunday through 6 for Saturday and only
    /// affects [`CalendarPeriod::Week`].
    pub fn resolve<Tz: TimeZone>(&self, now: &DateTime<Tz>, week_start_day: u8) -> Interval {
        let tz = now.timezone();
        let today = now.date_naive();
        let (first, next) = self.date_bounds(today, week_start_day);
        Interval::clamped(start_of_day(&tz, first), start_of_day(&tz, next))
    }

    /// Calendar dates `[first, next)` of the period containing `today`.
    fn date_bounds(&self, today: NaiveDate, week_start_day: u8) -> (NaiveDate, NaiveDate) {
        match self {
            CalendarPeriod::Day => (today, add_days(today, 1)),
            CalendarPeriod::Week => {
                let start = weekday_from_index(week_start_day);
                let back = (today.weekday().num_days_from_sunday() + 7
                    - start.num_days_from_sunday())
                    % 7;
                let first = add_days(today, -i64::from(back));
                (first, add_days(first, 7))
            }
            CalendarPeriod::Month => {
                let first = today.with_day(1).unwrap_or(today);
                let next = first_of_next_month(today.year(), today.month())
                    .unwrap_or(NaiveDate::MAX);
                (first, next)
            }
            CalendarPeriod::Year => {
                let first = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
                let next =
                    NaiveDate::from_ymd_opt(today.year() + 1, 1, 1).unwrap_or(NaiveDate::MAX);
                (first, next)
            }
        }
    }

    /// Elapsed fraction of the period containing `now`.
    pub fn elapsed_fraction<Tz: TimeZone>(&self, now: &DateTime<Tz>, week_start_day: u8) -> f64 {
        self.resolve(now, week_start_day).elapsed_fraction(now)
    }

    /// The number identifying the current period: day of month, weekday
    /// (1 = Sunday), month number or year.
    pub fn current_value<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> i32 {
        match self {
            CalendarPeriod::Day => now.day() as i32,
            CalendarPeriod::Week => now.weekday().number_from_sunday() as i32,
            CalendarPeriod::Month => now.month() as i32,
            CalendarPeriod::Year => now.year(),
        }
    }

    /// Short display name of the current period, e.g. "27th", "Sat", "Sep", "2025".
    pub fn current_label<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> String
    where
        Tz::Offset: fmt::Display,
    {
        match self {
            CalendarPeriod::Day => {
                let day = now.day();
                format!("{day}{}", crate::progress::ordinal_suffix(day))
            }
            CalendarPeriod::Week => now.format("%a").to_string(),
            CalendarPeriod::Month => now.format("%b").to_string(),
            CalendarPeriod::Year => now.year().to_string(),
        }
    }
}

impl fmt::Display for CalendarPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CalendarPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day" => Ok(CalendarPeriod::Day),
            "week" => Ok(CalendarPeriod::Week),
            "month" => Ok(CalendarPeriod::Month),
            "year" => Ok(CalendarPeriod::Year),
            other => Err(format!("unknown period: {other}")),
        }
    }
}
