//! SQLite-based event storage.
//!
//! Provides persistent storage for:
//! - User events, including their repeat rules
//! - Key-value store for application state (widget placements)

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use tokio::sync::broadcast;
use tracing::debug;

use super::{data_dir, migrations};
use crate::error::{CoreError, DatabaseError, Result};
use crate::event::Event;
use crate::recurrence::RecurrenceRule;
use crate::store::{ChangeFeed, EventStore, StoreChange};

const EVENT_COLUMNS: &str = "id, title, description, all_day, start_time, end_time, recurrence";

/// SQLite database for event storage.
///
/// The connection sits behind a mutex so one handle can be shared between
/// the CLI and the refresh scheduler's blocking reads.
pub struct Database {
    conn: Mutex<Connection>,
    feed: ChangeFeed,
}

impl Database {
    /// Open the database at `<data_dir>/yearprogress.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("yearprogress.db");
        Self::open_at(path)
    }

    /// Open (or create) the database at an explicit path.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: PathBuf::from(path),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| DatabaseError::OpenFailed {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        migrations::migrate(&conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
            feed: ChangeFeed::default(),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CoreError::StoreUnavailable(DatabaseError::Locked))
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn query_events(&self, sql: &str, needle: Option<&str>) -> Result<Vec<Event>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = match needle {
            Some(needle) => stmt.query_map(params![needle], row_to_event)?,
            None => stmt.query_map([], row_to_event)?,
        };
        let events = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }
}

fn insert_event(conn: &Connection, mut event: Event) -> Result<Event> {
    event.validate()?;
    conn.execute(
        "INSERT INTO events (title, description, all_day, start_time, end_time, recurrence)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            event.title,
            event.description,
            event.all_day,
            event.start_time.to_rfc3339(),
            event.end_time.to_rfc3339(),
            encode_rule(event.recurrence.as_ref())?,
        ],
    )?;
    event.id = conn.last_insert_rowid();
    Ok(event)
}

fn encode_rule(rule: Option<&RecurrenceRule>) -> Result<Option<String>> {
    Ok(rule.map(serde_json::to_string).transpose()?)
}

fn parse_time(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_event(row: &Row<'_>) -> rusqlite::Result<Event> {
    let start_raw: String = row.get(4)?;
    let end_raw: String = row.get(5)?;
    let recurrence = row
        .get::<_, Option<String>>(6)?
        .map(|raw| serde_json::from_str::<RecurrenceRule>(&raw))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;

    Ok(Event {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        all_day: row.get(3)?,
        start_time: parse_time(4, &start_raw)?,
        end_time: parse_time(5, &end_raw)?,
        recurrence,
    })
}

impl EventStore for Database {
    fn add(&self, event: Event) -> Result<Event> {
        let stored = {
            let conn = self.conn()?;
            insert_event(&conn, event)?
        };
        debug!(id = stored.id, "event added");
        self.feed.publish(StoreChange::Added(stored.id));
        Ok(stored)
    }

    fn add_all(&self, events: Vec<Event>) -> Result<Vec<Event>> {
        let stored = {
            let conn = self.conn()?;
            let tx = conn.unchecked_transaction()?;
            let stored = events
                .into_iter()
                .map(|event| insert_event(&tx, event))
                .collect::<Result<Vec<_>>>()?;
            tx.commit()?;
            stored
        };
        for event in &stored {
            self.feed.publish(StoreChange::Added(event.id));
        }
        Ok(stored)
    }

    fn update(&self, event: &Event) -> Result<()> {
        event.validate()?;
        let changed = self.conn()?.execute(
            "UPDATE events
             SET title = ?2, description = ?3, all_day = ?4,
                 start_time = ?5, end_time = ?6, recurrence = ?7
             WHERE id = ?1",
            params![
                event.id,
                event.title,
                event.description,
                event.all_day,
                event.start_time.to_rfc3339(),
                event.end_time.to_rfc3339(),
                encode_rule(event.recurrence.as_ref())?,
            ],
        )?;
        if changed == 0 {
            return Err(CoreError::EventNotFound(event.id));
        }
        self.feed.publish(StoreChange::Updated(event.id));
        Ok(())
    }

    fn delete(&self, event: &Event) -> Result<()> {
        let changed = self
            .conn()?
            .execute("DELETE FROM events WHERE id = ?1", params![event.id])?;
        if changed == 0 {
            return Err(CoreError::EventNotFound(event.id));
        }
        self.feed.publish(StoreChange::Deleted(event.id));
        Ok(())
    }

    fn delete_all(&self) -> Result<()> {
        self.conn()?.execute("DELETE FROM events", [])?;
        self.feed.publish(StoreChange::Cleared);
        Ok(())
    }

    fn get(&self, id: i64) -> Result<Option<Event>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"))?;
        let result = stmt.query_row(params![id], row_to_event);
        match result {
            Ok(event) => Ok(Some(event)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> Result<Vec<Event>> {
        self.query_events(&format!("SELECT {EVENT_COLUMNS} FROM events ORDER BY id"), None)
    }

    fn filter(&self, needle: &str) -> Result<Vec<Event>> {
        // instr() is case-sensitive, unlike LIKE.
        self.query_events(
            &format!(
                "SELECT {EVENT_COLUMNS} FROM events
                 WHERE instr(title, ?1) > 0 OR instr(description, ?1) > 0
                 ORDER BY id"
            ),
            Some(needle),
        )
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.feed.subscribe()
    }
}
