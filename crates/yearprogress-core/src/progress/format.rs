//! Label formatting for progress snapshots.

use chrono::Duration;

/// Labels never carry more fractional digits than this.
pub const MAX_DECIMAL_DIGITS: u8 = 9;

/// A percentage rounded once to a fixed number of fractional digits.
///
/// Stored as integer units of `10^-digits` percent so that the elapsed and
/// remaining labels are exact complements of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FixedPercent {
    units: i64,
    digits: u8,
}

impl FixedPercent {
    pub(crate) fn from_fraction(fraction: f64, digits: u8) -> Self {
        let digits = digits.min(MAX_DECIMAL_DIGITS);
        let whole = Self::whole(digits);
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let units = ((fraction * whole as f64).round() as i64).clamp(0, whole);
        Self { units, digits }
    }

    /// Units representing 100%.
    fn whole(digits: u8) -> i64 {
        100 * 10_i64.pow(u32::from(digits))
    }

    pub(crate) fn complement(&self) -> Self {
        Self {
            units: Self::whole(self.digits) - self.units,
            digits: self.digits,
        }
    }

    pub(crate) fn label(&self) -> String {
        if self.digits == 0 {
            return format!("{}%", self.units);
        }
        let per_percent = 10_i64.pow(u32::from(self.digits));
        let int = self.units / per_percent;
        let frac = self.units % per_percent;
        format!("{int}.{frac:0width$}%", width = usize::from(self.digits))
    }
}

/// Format a duration as `2d 3h 4m 5s`, dropping leading zero components.
pub fn format_time_left(left: Duration) -> String {
    let total = left.num_seconds().max(0);
    let days = total / 86_400;
    let hours = total % 86_400 / 3_600;
    let minutes = total % 3_600 / 60;
    let seconds = total % 60;

    let mut parts = Vec::with_capacity(4);
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if days > 0 || hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if days > 0 || hours > 0 || minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    parts.push(format!("{seconds}s"));
    parts.join(" ")
}

/// English ordinal suffix: 1st, 2nd, 3rd, 4th, 11th, 21st.
pub fn ordinal_suffix(number: u32) -> &'static str {
    match (number % 100, number % 10) {
        (11..=13, _) => "th",
        (_, 1) => "st",
        (_, 2) => "nd",
        (_, 3) => "rd",
        _ => "th",
    }
}
