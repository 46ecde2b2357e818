//! Rendering surfaces.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use super::WidgetKind;
use crate::progress::ProgressSnapshot;

/// Where computed snapshots are pushed. One writer per widget kind.
pub trait RenderSurface: Send + Sync {
    fn render(&self, kind: WidgetKind, snapshot: &ProgressSnapshot);
}

/// In-memory surface that keeps the newest snapshot per widget kind.
///
/// A snapshot computed earlier than the one already shown is dropped, so
/// out-of-order writes cannot roll a widget back. A skipped refresh leaves
/// the previous snapshot in place.
#[derive(Debug, Default)]
pub struct SnapshotBoard {
    latest: Mutex<BTreeMap<WidgetKind, ProgressSnapshot>>,
}

impl SnapshotBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self, kind: WidgetKind) -> Option<ProgressSnapshot> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
    }

    /// Every displayed snapshot, ordered by kind.
    pub fn all(&self) -> Vec<(WidgetKind, ProgressSnapshot)> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(kind, snapshot)| (*kind, snapshot.clone()))
            .collect()
    }
}

impl RenderSurface for SnapshotBoard {
    fn render(&self, kind: WidgetKind, snapshot: &ProgressSnapshot) {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = latest.get(&kind) {
            if current.computed_at > snapshot.computed_at {
                debug!(%kind, "dropping stale snapshot");
                return;
            }
        }
        latest.insert(kind, snapshot.clone());
    }
}
