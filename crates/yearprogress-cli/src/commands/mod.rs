pub mod config;
pub mod event;
pub mod progress;
pub mod widget;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};
use yearprogress_core::period::calendar::{local_instant, start_of_day};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Parse a user supplied instant.
///
/// Accepts RFC 3339 (`2025-09-27T10:00:00Z`), or local wall-clock time as
/// `2025-09-27 10:00`, `2025-09-27T10:00`, or a bare date meaning local
/// midnight.
pub fn parse_time(input: &str) -> Result<DateTime<Utc>, String> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(local_instant(&Local, naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(start_of_day(&Local, date));
    }
    Err(format!("invalid time: {input} (expected RFC 3339 or YYYY-MM-DD[ HH:MM])"))
}

pub fn print_json<T: serde::Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
