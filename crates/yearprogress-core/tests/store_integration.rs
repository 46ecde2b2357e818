//! Integration tests for the on-disk event store and configuration.

use chrono::{DateTime, Utc, Weekday};
use yearprogress_core::storage::migrations::{self, SCHEMA_VERSION};
use yearprogress_core::{Config, CoreError, Database, Event, EventStore, RecurrenceRule};

fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

#[test]
fn test_events_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("yearprogress.db");

    let stored = {
        let db = Database::open_at(&path).unwrap();
        db.add_all(vec![
            Event::new("Exam", "math", at("2025-06-01T09:00:00Z"), at("2025-06-01T12:00:00Z")),
            Event::new("Gym", "", at("2025-09-01T18:00:00Z"), at("2025-09-01T19:00:00Z"))
                .with_recurrence(RecurrenceRule::weekly([Weekday::Mon, Weekday::Wed])),
            Event::new("Rent", "", at("2025-01-31T08:00:00Z"), at("2025-01-31T09:00:00Z"))
                .with_recurrence(RecurrenceRule::Monthly),
        ])
        .unwrap()
    };

    let db = Database::open_at(&path).unwrap();
    assert_eq!(db.list().unwrap(), stored);
    assert_eq!(db.filter("math").unwrap().len(), 1);
    assert_eq!(db.filter("Math").unwrap().len(), 0);
}

#[test]
fn test_reopen_does_not_rerun_migrations() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("yearprogress.db");
    Database::open_at(&path).unwrap();
    Database::open_at(&path).unwrap();

    let conn = rusqlite::Connection::open(&path).unwrap();
    assert_eq!(migrations::schema_version(&conn), SCHEMA_VERSION);
}

#[test]
fn test_open_in_missing_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("yearprogress.db");
    let err = Database::open_at(&path).err().unwrap();
    assert!(matches!(err, CoreError::StoreUnavailable(_)));
    assert!(err.is_transient());
}

#[test]
fn test_delete_all_then_ids_keep_growing() {
    let db = Database::open_memory().unwrap();
    let first = db
        .add(Event::new("a", "", at("2025-01-01T00:00:00Z"), at("2025-01-02T00:00:00Z")))
        .unwrap();
    db.delete_all().unwrap();
    assert!(db.list().unwrap().is_empty());
    let second = db
        .add(Event::new("b", "", at("2025-01-01T00:00:00Z"), at("2025-01-02T00:00:00Z")))
        .unwrap();
    assert!(second.id > first.id);
}

#[test]
fn test_config_file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let mut cfg = Config::load_from(&path).unwrap();
    cfg.set("progress.week_start_day", "1").unwrap();
    cfg.set("widgets.event_cadence_secs", "30").unwrap();
    cfg.save_to(&path).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("[progress]"));
    assert!(content.contains("week_start_day = 1"));

    let reloaded = Config::load_from(&path).unwrap();
    assert_eq!(reloaded.progress.week_start_day, 1);
    assert_eq!(reloaded.widgets.event_cadence_secs, 30);
    assert_eq!(reloaded.progress_config().week_start_day, 1);
}

#[test]
fn test_config_with_invalid_values_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[progress]\nweek_start_day = 9\n").unwrap();
    assert!(matches!(
        Config::load_from(&path),
        Err(CoreError::Config(_))
    ));
}
