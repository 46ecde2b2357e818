//! Property tests for the period model and progress engine.

use chrono::{DateTime, Datelike, Duration, FixedOffset, TimeZone, Utc};
use proptest::prelude::*;
use yearprogress_core::{
    compute_snapshot, next_occurrence, CalendarPeriod, Event, ProgressConfig, RecurrenceRule,
    Subject, WeekdaySet,
};

// 1970-01-01 .. 2100-01-01
const MIN_SECS: i64 = 0;
const MAX_SECS: i64 = 4_102_444_800;

fn instant() -> impl Strategy<Value = DateTime<Utc>> {
    (MIN_SECS..MAX_SECS).prop_map(|secs| Utc.timestamp_opt(secs, 0).unwrap())
}

fn offset() -> impl Strategy<Value = FixedOffset> {
    (-12i32..=14).prop_map(|hours| FixedOffset::east_opt(hours * 3600).unwrap())
}

fn period() -> impl Strategy<Value = CalendarPeriod> {
    prop::sample::select(CalendarPeriod::ALL.to_vec())
}

proptest! {
    #[test]
    fn fraction_stays_in_unit_range(now in instant(), tz in offset(), period in period(), week_start in 0u8..7) {
        let local = now.with_timezone(&tz);
        let fraction = period.elapsed_fraction(&local, week_start);
        prop_assert!((0.0..=1.0).contains(&fraction));
    }

    #[test]
    fn resolved_period_contains_now(now in instant(), tz in offset(), period in period(), week_start in 0u8..7) {
        let local = now.with_timezone(&tz);
        let interval = period.resolve(&local, week_start);
        prop_assert!(interval.start() <= now);
        prop_assert!(now < interval.end());
    }

    #[test]
    fn fraction_is_zero_at_start_and_one_at_end(now in instant(), tz in offset(), period in period()) {
        let local = now.with_timezone(&tz);
        let interval = period.resolve(&local, 0);
        prop_assert_eq!(interval.elapsed_fraction(&interval.start()), 0.0);
        prop_assert_eq!(interval.elapsed_fraction(&interval.end()), 1.0);
    }

    #[test]
    fn labels_are_exact_complements(now in instant(), period in period(), digits in 0u8..=4) {
        let config = ProgressConfig::default().with_decimal_digits(digits);
        let snapshot = compute_snapshot(Subject::Period(period), &now, &config).unwrap();
        let parse = |label: &str| label.trim_end_matches('%').replace('.', "").parse::<i64>().unwrap();
        let whole = 100 * 10_i64.pow(u32::from(digits));
        prop_assert_eq!(parse(&snapshot.elapsed_label) + parse(&snapshot.remaining_label), whole);
    }

    #[test]
    fn snapshots_are_deterministic(now in instant(), period in period()) {
        let config = ProgressConfig::default();
        let a = compute_snapshot(Subject::Period(period), &now, &config).unwrap();
        let b = compute_snapshot(Subject::Period(period), &now, &config).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn occurrences_keep_duration_and_do_not_end_before_query(
        start in instant(),
        minutes in 1i64..600,
        ahead_days in 0i64..2_000,
        rule_index in 0usize..3,
    ) {
        let rule = match rule_index {
            0 => RecurrenceRule::weekly([start.weekday()]),
            1 => RecurrenceRule::Monthly,
            _ => RecurrenceRule::Yearly,
        };
        let event = Event::new("e", "", start, start + Duration::minutes(minutes)).with_recurrence(rule);
        let after = start + Duration::days(ahead_days);
        let next = next_occurrence(&event, &after).unwrap();
        prop_assert!(next.end() >= after);
        // Calendar clamping can shift the start date but never the length.
        prop_assert_eq!(next.duration(), Duration::minutes(minutes));
    }
}

#[test]
fn empty_weekday_set_is_rejected_for_any_query() {
    let start = Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap();
    let event = Event::new("e", "", start, start + Duration::hours(1)).with_recurrence(
        RecurrenceRule::Weekly {
            days: WeekdaySet::EMPTY,
        },
    );
    assert!(next_occurrence(&event, &start).is_err());
}
