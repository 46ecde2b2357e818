use chrono::Local;
use clap::Args;
use serde::Serialize;
use yearprogress_core::{compute_snapshot, CalendarPeriod, Config, ProgressSnapshot, Subject};

use super::{print_json, CliResult};

#[derive(Args)]
pub struct ProgressArgs {
    /// Only show one period (day, week, month, year)
    #[arg(long)]
    period: Option<CalendarPeriod>,
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// A period snapshot plus the numeric position inside its parent period
/// (day of month, weekday, month number, or year).
#[derive(Serialize)]
struct PeriodProgress {
    #[serde(flatten)]
    snapshot: ProgressSnapshot,
    current_value: i32,
}

pub fn run(args: ProgressArgs) -> CliResult {
    let config = Config::load()?.progress_config();
    let now = Local::now();
    let periods = match args.period {
        Some(period) => vec![period],
        None => CalendarPeriod::ALL.to_vec(),
    };

    let rows = periods
        .into_iter()
        .map(|period| {
            compute_snapshot(Subject::Period(period), &now, &config).map(|snapshot| {
                PeriodProgress {
                    snapshot,
                    current_value: period.current_value(&now),
                }
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if args.json {
        return print_json(&rows);
    }
    for row in &rows {
        println!("{}", summary_line(&row.snapshot));
    }
    Ok(())
}

/// `year   2025    75.34%  90d 3h 12m 5s left`
pub fn summary_line(snapshot: &ProgressSnapshot) -> String {
    format!(
        "{:<10} {:<8} {:>8}  {} left",
        snapshot.subject_id, snapshot.title, snapshot.headline_label, snapshot.time_left_label
    )
}
