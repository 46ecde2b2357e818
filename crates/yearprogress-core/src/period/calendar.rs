//! Local calendar helpers.
//!
//! Everything here works on calendar dates in a resolved timezone and turns
//! them into UTC instants. Month lengths and leap years come from chrono's
//! date arithmetic, never from fixed day counts.

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
    Utc, Weekday,
};

/// Longest walk used to escape a DST gap (one full day of 15 minute steps).
const GAP_STEPS: usize = 4 * 24;

/// Resolve a local wall-clock time to a UTC instant.
///
/// Ambiguous times (clocks going back) resolve to the earliest instant.
/// Non-existent times (clocks going forward) resolve to the first valid
/// local time after the gap.
pub fn local_instant<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    let mut candidate = naive;
    for _ in 0..GAP_STEPS {
        match tz.from_local_datetime(&candidate) {
            LocalResult::Single(dt) => return dt.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => return earliest.with_timezone(&Utc),
            LocalResult::None => candidate += Duration::minutes(15),
        }
    }
    Utc.from_utc_datetime(&naive)
}

/// First instant of `date` in `tz`.
pub fn start_of_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    local_instant(tz, date.and_time(NaiveTime::MIN))
}

/// `date + days`, saturating at chrono's supported range.
pub fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    date.checked_add_signed(Duration::days(days))
        .unwrap_or(if days >= 0 { NaiveDate::MAX } else { NaiveDate::MIN })
}

/// First day of the month after (`year`, `month`).
pub fn first_of_next_month(year: i32, month: u32) -> Option<NaiveDate> {
    if month >= 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
}

/// Number of days in the given month (28..=31).
pub fn days_in_month(year: i32, month: u32) -> u32 {
    first_of_next_month(year, month)
        .and_then(|next| next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(31)
}

/// Date in (`year`, `month`) with `day` clamped to the month's last day.
///
/// Day 31 in a 30 day month becomes the 30th, Feb 29 in a non-leap year
/// becomes Feb 28.
pub fn clamped_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let day = day.clamp(1, days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Month arithmetic on a (year, month) pair.
pub fn shift_month(year: i32, month: u32, offset: i32) -> (i32, u32) {
    let index = year * 12 + month as i32 - 1 + offset;
    (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

/// Weekday for a week-start index where 0 is Sunday and 6 is Saturday.
///
/// Out-of-range indices wrap.
pub fn weekday_from_index(index: u8) -> Weekday {
    match index % 7 {
        0 => Weekday::Sun,
        1 => Weekday::Mon,
        2 => Weekday::Tue,
        3 => Weekday::Wed,
        4 => Weekday::Thu,
        5 => Weekday::Fri,
        _ => Weekday::Sat,
    }
}
