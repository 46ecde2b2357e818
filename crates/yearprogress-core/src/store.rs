//! Event store abstraction.
//!
//! The scheduler and the CLI only talk to events through [`EventStore`].
//! Every mutation is announced on a broadcast channel so widgets showing the
//! affected event can refresh immediately instead of waiting for their next
//! cadence tick.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::{CoreError, DatabaseError, Result};
use crate::event::Event;

/// Buffered change notifications per subscriber.
const CHANGE_CAPACITY: usize = 64;

/// A mutation applied to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum StoreChange {
    Added(i64),
    Updated(i64),
    Deleted(i64),
    /// Every event was removed.
    Cleared,
}

impl StoreChange {
    /// Whether a widget showing event `id` must refresh.
    pub fn affects(&self, id: i64) -> bool {
        match *self {
            StoreChange::Added(changed)
            | StoreChange::Updated(changed)
            | StoreChange::Deleted(changed) => changed == id,
            StoreChange::Cleared => true,
        }
    }
}

/// Persistent collection of events.
///
/// Calls are synchronous and may block; async callers should move them onto
/// a blocking thread. Failures surface as [`CoreError::StoreUnavailable`].
pub trait EventStore: Send + Sync {
    /// Insert `event`, ignoring its id, and return it with the assigned id.
    fn add(&self, event: Event) -> Result<Event>;

    /// Insert several events atomically.
    fn add_all(&self, events: Vec<Event>) -> Result<Vec<Event>>;

    /// Replace the stored event with the same id.
    fn update(&self, event: &Event) -> Result<()>;

    fn delete(&self, event: &Event) -> Result<()>;

    fn delete_all(&self) -> Result<()>;

    fn get(&self, id: i64) -> Result<Option<Event>>;

    /// All events, ordered by id.
    fn list(&self) -> Result<Vec<Event>>;

    /// Events whose title or description contains `needle` (case-sensitive).
    fn filter(&self, needle: &str) -> Result<Vec<Event>>;

    /// Receive every change applied after this call.
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}

/// Broadcast side of the change feed, shared by store implementations.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<StoreChange>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(CHANGE_CAPACITY);
        Self { tx }
    }
}

impl ChangeFeed {
    pub fn publish(&self, change: StoreChange) {
        // No subscribers is fine.
        if self.tx.send(change).is_err() {
            debug!(?change, "store change dropped, no subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.tx.subscribe()
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    last_id: i64,
    events: BTreeMap<i64, Event>,
}

impl MemoryState {
    fn insert(&mut self, mut event: Event) -> Event {
        self.last_id += 1;
        event.id = self.last_id;
        self.events.insert(event.id, event.clone());
        event
    }
}

/// Volatile store backed by a map. Used by tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    feed: ChangeFeed,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| CoreError::StoreUnavailable(DatabaseError::Locked))
    }
}

impl EventStore for MemoryStore {
    fn add(&self, event: Event) -> Result<Event> {
        event.validate()?;
        let stored = self.state()?.insert(event);
        self.feed.publish(StoreChange::Added(stored.id));
        Ok(stored)
    }

    fn add_all(&self, events: Vec<Event>) -> Result<Vec<Event>> {
        for event in &events {
            event.validate()?;
        }
        let stored: Vec<Event> = {
            let mut state = self.state()?;
            events.into_iter().map(|e| state.insert(e)).collect()
        };
        for event in &stored {
            self.feed.publish(StoreChange::Added(event.id));
        }
        Ok(stored)
    }

    fn update(&self, event: &Event) -> Result<()> {
        event.validate()?;
        {
            let mut state = self.state()?;
            let slot = state
                .events
                .get_mut(&event.id)
                .ok_or(CoreError::EventNotFound(event.id))?;
            *slot = event.clone();
        }
        self.feed.publish(StoreChange::Updated(event.id));
        Ok(())
    }

    fn delete(&self, event: &Event) -> Result<()> {
        let removed = self.state()?.events.remove(&event.id);
        if removed.is_none() {
            return Err(CoreError::EventNotFound(event.id));
        }
        self.feed.publish(StoreChange::Deleted(event.id));
        Ok(())
    }

    fn delete_all(&self) -> Result<()> {
        self.state()?.events.clear();
        self.feed.publish(StoreChange::Cleared);
        Ok(())
    }

    fn get(&self, id: i64) -> Result<Option<Event>> {
        Ok(self.state()?.events.get(&id).cloned())
    }

    fn list(&self) -> Result<Vec<Event>> {
        Ok(self.state()?.events.values().cloned().collect())
    }

    fn filter(&self, needle: &str) -> Result<Vec<Event>> {
        Ok(self
            .state()?
            .events
            .values()
            .filter(|e| e.matches(needle))
            .cloned()
            .collect())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.feed.subscribe()
    }
}
