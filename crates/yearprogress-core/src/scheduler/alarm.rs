//! One-shot alarms.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::Notify;

use super::WidgetKind;

/// Platform wake-up primitive: a set of independently armed one-shot
/// alarms, at most one per widget kind. Delivery is at-least-once.
pub trait AlarmPrimitive: Send + Sync {
    /// Arm (or re-arm) the alarm for `kind`, replacing any pending one.
    fn arm(&self, kind: WidgetKind, at: DateTime<Utc>);

    /// Disarm the alarm for `kind`. Disarming nothing is a no-op.
    fn cancel(&self, kind: WidgetKind);
}

/// In-process alarm set driven by [`super::spawn_driver`].
#[derive(Debug, Default)]
pub struct AlarmClock {
    pending: Mutex<BTreeMap<WidgetKind, DateTime<Utc>>>,
    changed: Notify,
}

impl AlarmClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return every alarm due at `now`, earliest first.
    pub fn take_due(&self, now: DateTime<Utc>) -> Vec<WidgetKind> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let mut due: Vec<(DateTime<Utc>, WidgetKind)> = pending
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(kind, at)| (*at, *kind))
            .collect();
        due.sort();
        for (_, kind) in &due {
            pending.remove(kind);
        }
        due.into_iter().map(|(_, kind)| kind).collect()
    }

    /// Earliest pending alarm.
    pub fn next_wake(&self) -> Option<DateTime<Utc>> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .min()
            .copied()
    }

    pub fn pending(&self) -> Vec<(WidgetKind, DateTime<Utc>)> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(kind, at)| (*kind, *at))
            .collect()
    }

    /// Resolves after the next arm or cancel.
    pub async fn changed(&self) {
        self.changed.notified().await;
    }
}

impl AlarmPrimitive for AlarmClock {
    fn arm(&self, kind: WidgetKind, at: DateTime<Utc>) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind, at);
        self.changed.notify_one();
    }

    fn cancel(&self, kind: WidgetKind) {
        let removed = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&kind);
        if removed.is_some() {
            self.changed.notify_one();
        }
    }
}
