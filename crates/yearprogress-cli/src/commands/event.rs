//! Event management commands for CLI.

use std::path::PathBuf;

use chrono::Local;
use clap::Subcommand;
use yearprogress_core::{
    compute_snapshot, Config, CoreError, Database, Event, EventStore, RecurrenceRule, Subject,
};

use super::progress::summary_line;
use super::{parse_time, print_json, CliResult};

#[derive(Subcommand)]
pub enum EventAction {
    /// Create a new event
    Add {
        /// Event title
        title: String,
        /// Start time (RFC 3339 or YYYY-MM-DD[ HH:MM] local)
        #[arg(long)]
        start: String,
        /// End time (RFC 3339 or YYYY-MM-DD[ HH:MM] local)
        #[arg(long)]
        end: String,
        /// Event description
        #[arg(long, default_value = "")]
        description: String,
        /// Mark as an all-day event
        #[arg(long)]
        all_day: bool,
        /// Repeat rule: monthly, yearly, or weekdays such as mon,wed,fri
        #[arg(long)]
        repeat: Option<RecurrenceRule>,
    },
    /// List events
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Get event details
    Get {
        /// Event ID
        id: i64,
    },
    /// Update an event
    Update {
        /// Event ID
        id: i64,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New description
        #[arg(long)]
        description: Option<String>,
        /// New start time
        #[arg(long)]
        start: Option<String>,
        /// New end time
        #[arg(long)]
        end: Option<String>,
        /// Set all-day status
        #[arg(long)]
        all_day: Option<bool>,
        /// New repeat rule
        #[arg(long, conflicts_with = "no_repeat")]
        repeat: Option<RecurrenceRule>,
        /// Make the event one-shot
        #[arg(long)]
        no_repeat: bool,
    },
    /// Delete an event
    Delete {
        /// Event ID
        id: i64,
    },
    /// Delete every event
    Clear,
    /// Events whose title or description contains a string (case-sensitive)
    Filter {
        /// Substring to look for
        needle: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Progress of an event's current or next occurrence
    Progress {
        /// Event ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export all events as JSON
    Export {
        /// Write to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Import events from a JSON file written by `export`
    Import {
        /// JSON file with an array of events
        path: PathBuf,
    },
}

pub fn run(action: EventAction) -> CliResult {
    let db = Database::open()?;

    match action {
        EventAction::Add {
            title,
            start,
            end,
            description,
            all_day,
            repeat,
        } => {
            let mut event = Event::new(title, description, parse_time(&start)?, parse_time(&end)?);
            event.all_day = all_day;
            event.recurrence = repeat;
            let event = db.add(event)?;
            println!("Event created: {}", event.id);
            print_json(&event)?;
        }
        EventAction::List { json } => print_events(&db.list()?, json)?,
        EventAction::Get { id } => print_json(&get_event(&db, id)?)?,
        EventAction::Update {
            id,
            title,
            description,
            start,
            end,
            all_day,
            repeat,
            no_repeat,
        } => {
            let mut event = get_event(&db, id)?;
            if let Some(title) = title {
                event.title = title;
            }
            if let Some(description) = description {
                event.description = description;
            }
            if let Some(start) = start {
                event.start_time = parse_time(&start)?;
            }
            if let Some(end) = end {
                event.end_time = parse_time(&end)?;
            }
            if let Some(all_day) = all_day {
                event.all_day = all_day;
            }
            if repeat.is_some() {
                event.recurrence = repeat;
            } else if no_repeat {
                event.recurrence = None;
            }
            db.update(&event)?;
            println!("Event updated: {id}");
            print_json(&event)?;
        }
        EventAction::Delete { id } => {
            let event = get_event(&db, id)?;
            db.delete(&event)?;
            println!("Event deleted: {id}");
        }
        EventAction::Clear => {
            db.delete_all()?;
            println!("all events deleted");
        }
        EventAction::Filter { needle, json } => print_events(&db.filter(&needle)?, json)?,
        EventAction::Progress { id, json } => {
            let event = get_event(&db, id)?;
            let config = Config::load()?.event_progress_config();
            let snapshot = compute_snapshot(Subject::Event(&event), &Local::now(), &config)?;
            if json {
                print_json(&snapshot)?;
            } else {
                println!("{}", summary_line(&snapshot));
            }
        }
        EventAction::Export { output } => {
            let json = serde_json::to_string_pretty(&db.list()?)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    println!("exported to {}", path.display());
                }
                None => println!("{json}"),
            }
        }
        EventAction::Import { path } => {
            let content = std::fs::read_to_string(&path)?;
            let events: Vec<Event> = serde_json::from_str(&content)?;
            // Ids are reassigned by the store.
            let events = events
                .into_iter()
                .map(|event| Event { id: 0, ..event })
                .collect();
            let stored = db.add_all(events)?;
            println!("imported {} events", stored.len());
        }
    }
    Ok(())
}

fn get_event(db: &Database, id: i64) -> Result<Event, CoreError> {
    db.get(id)?.ok_or(CoreError::EventNotFound(id))
}

fn print_events(events: &[Event], json: bool) -> CliResult {
    if json {
        return print_json(&events);
    }
    if events.is_empty() {
        println!("no events");
        return Ok(());
    }
    for event in events {
        let repeat = event
            .recurrence
            .map(|rule| format!("  ({rule})"))
            .unwrap_or_default();
        println!(
            "{:>4}  {}  {} .. {}{}",
            event.id,
            event.title,
            event.start_time.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            event.end_time.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            repeat
        );
    }
    Ok(())
}
