use std::fmt;
use std::str::FromStr;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

/// A set of weekdays stored as a bitmask (bit 0 = Sunday).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Weekday>", into = "Vec<Weekday>")]
pub struct WeekdaySet(u8);

const WEEK_FROM_SUNDAY: [Weekday; 7] = [
    Weekday::Sun,
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
];

impl WeekdaySet {
    pub const EMPTY: WeekdaySet = WeekdaySet(0);

    fn bit(day: Weekday) -> u8 {
        1 << day.num_days_from_sunday()
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & Self::bit(day) != 0
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= Self::bit(day);
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Days in the set, Sunday first.
    pub fn iter(&self) -> impl Iterator<Item = Weekday> + '_ {
        WEEK_FROM_SUNDAY
            .iter()
            .copied()
            .filter(move |day| self.contains(*day))
    }
}

impl FromIterator<Weekday> for WeekdaySet {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        let mut set = WeekdaySet::EMPTY;
        for day in iter {
            set.insert(day);
        }
        set
    }
}

impl From<Vec<Weekday>> for WeekdaySet {
    fn from(days: Vec<Weekday>) -> Self {
        days.into_iter().collect()
    }
}

impl From<WeekdaySet> for Vec<Weekday> {
    fn from(set: WeekdaySet) -> Self {
        set.iter().collect()
    }
}

/// How an event repeats. Variants are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecurrenceRule {
    /// Repeats on each listed weekday at the original time of day.
    Weekly { days: WeekdaySet },
    /// Repeats on the original day of month.
    Monthly,
    /// Repeats on the original month and day.
    Yearly,
}

impl RecurrenceRule {
    pub fn weekly(days: impl IntoIterator<Item = Weekday>) -> Self {
        RecurrenceRule::Weekly {
            days: days.into_iter().collect(),
        }
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecurrenceRule::Weekly { days } => {
                let names: Vec<String> = days.iter().map(|d| d.to_string()).collect();
                write!(f, "weekly on {}", names.join(","))
            }
            RecurrenceRule::Monthly => f.write_str("monthly"),
            RecurrenceRule::Yearly => f.write_str("yearly"),
        }
    }
}

/// Parses `monthly`, `yearly`, or a comma separated weekday list such as
/// `mon,wed,fri`.
impl FromStr for RecurrenceRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" | "every_month" => Ok(RecurrenceRule::Monthly),
            "yearly" | "every_year" => Ok(RecurrenceRule::Yearly),
            list => {
                let days = list
                    .split(',')
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .map(|part| {
                        part.parse::<Weekday>()
                            .map_err(|_| format!("unknown weekday: {part}"))
                    })
                    .collect::<Result<WeekdaySet, _>>()?;
                Ok(RecurrenceRule::Weekly { days })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weekday_set_membership() {
        let mut set: WeekdaySet = [Weekday::Mon, Weekday::Fri].into_iter().collect();
        assert!(set.contains(Weekday::Mon));
        assert!(!set.contains(Weekday::Tue));
        assert_eq!(set.len(), 2);
        set.insert(Weekday::Mon);
        assert_eq!(set.len(), 2);
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![Weekday::Mon, Weekday::Fri]
        );
        assert!(WeekdaySet::EMPTY.is_empty());
    }

    #[test]
    fn rule_serializes_as_tagged_union() {
        let rule = RecurrenceRule::weekly([Weekday::Sun, Weekday::Wed]);
        let json = serde_json::to_string(&rule).unwrap();
        assert_eq!(json, r#"{"type":"weekly","days":["Sun","Wed"]}"#);
        let back: RecurrenceRule = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rule);

        let monthly = serde_json::to_string(&RecurrenceRule::Monthly).unwrap();
        assert_eq!(monthly, r#"{"type":"monthly"}"#);
    }

    #[test]
    fn parses_rule_strings() {
        assert_eq!("monthly".parse(), Ok(RecurrenceRule::Monthly));
        assert_eq!("YEARLY".parse(), Ok(RecurrenceRule::Yearly));
        assert_eq!(
            "mon, fri".parse(),
            Ok(RecurrenceRule::weekly([Weekday::Mon, Weekday::Fri]))
        );
        assert!("someday".parse::<RecurrenceRule>().is_err());
    }
}
