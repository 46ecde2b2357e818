//! Widget refresh scheduling.
//!
//! Every placed widget kind owns one [`WidgetRefreshTask`], driven by a
//! one-shot alarm that is re-armed after each fire:
//!
//! ```text
//! SCHEDULED -> FIRED -> RESCHEDULED -> FIRED -> ...
//!     \          |           /
//!      +---> CANCELLED <----+
//! ```
//!
//! On every fire the next alarm is computed from the current clock as
//! `min(now + cadence, next natural boundary)`, so a day widget always
//! refreshes at local midnight and a device that slept through several
//! intended fires simply resumes with a correct value.
//!
//! Store reads are the only blocking step. They run on the blocking pool
//! under a timeout; a failed or slow read skips the render for that cycle
//! and leaves the last good snapshot on the surface.

pub mod alarm;
pub mod boundary;
mod driver;
pub mod surface;

pub use alarm::{AlarmClock, AlarmPrimitive};
pub use driver::spawn_driver;
pub use surface::{RenderSurface, SnapshotBoard};

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CoreError, DatabaseError, Result};
use crate::event::Event;
use crate::period::CalendarPeriod;
use crate::progress::{compute_snapshot, ProgressConfig, ProgressSnapshot, Subject};
use crate::store::{EventStore, StoreChange};

/// What a widget shows. All instances of one kind share a refresh task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum WidgetKind {
    Period(CalendarPeriod),
    Event(i64),
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WidgetKind::Period(period) => f.write_str(period.as_str()),
            WidgetKind::Event(id) => write!(f, "event:{id}"),
        }
    }
}

impl FromStr for WidgetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(id) = s.strip_prefix("event:") {
            return id
                .parse()
                .map(WidgetKind::Event)
                .map_err(|_| format!("invalid event id: {id}"));
        }
        s.parse().map(WidgetKind::Period)
    }
}

impl From<WidgetKind> for String {
    fn from(kind: WidgetKind) -> Self {
        kind.to_string()
    }
}

impl TryFrom<String> for WidgetKind {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Armed from scratch; has not fired since.
    Scheduled,
    /// A refresh is in progress.
    Fired,
    /// Armed again after a fire.
    Rescheduled,
    /// Terminal. Late alarm deliveries are ignored.
    Cancelled,
}

impl TaskState {
    pub fn is_armed(&self) -> bool {
        matches!(self, TaskState::Scheduled | TaskState::Rescheduled)
    }
}

/// Refresh bookkeeping for one widget kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetRefreshTask {
    pub kind: WidgetKind,
    #[serde(with = "duration_secs")]
    pub cadence: Duration,
    pub next_fire_at: DateTime<Utc>,
    pub last_fired_at: Option<DateTime<Utc>>,
    /// Placed widget instances of this kind.
    pub instances: u32,
    pub state: TaskState,
    /// Bumped each time the kind is placed again after a cancel, so a fire
    /// that started before the cancel cannot act on the new task.
    #[serde(default)]
    pub generation: u64,
    /// A store change arrived while the task was firing; re-fire at once.
    #[serde(default)]
    pub refresh_pending: bool,
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

/// Result of delivering an alarm.
#[derive(Debug, Clone, PartialEq)]
pub enum FireOutcome {
    /// A fresh snapshot was rendered.
    Rendered { next_fire_at: DateTime<Utc> },
    /// The snapshot could not be computed; the surface keeps its last value.
    Skipped {
        next_fire_at: DateTime<Utc>,
        reason: String,
    },
    /// A fire is already in progress; it re-fires as soon as it completes.
    Deferred,
    /// The task is unknown, cancelled, or already firing.
    Ignored,
}

impl FireOutcome {
    pub fn next_fire_at(&self) -> Option<DateTime<Utc>> {
        match self {
            FireOutcome::Rendered { next_fire_at } | FireOutcome::Skipped { next_fire_at, .. } => {
                Some(*next_fire_at)
            }
            FireOutcome::Deferred | FireOutcome::Ignored => None,
        }
    }
}

/// Settings snapshot read at the start of every fire.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshSettings {
    pub period: ProgressConfig,
    pub event: ProgressConfig,
    pub store_read_timeout: Duration,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            period: ProgressConfig::default(),
            event: ProgressConfig::default(),
            store_read_timeout: Duration::from_secs(2),
        }
    }
}

impl From<&crate::storage::Config> for RefreshSettings {
    fn from(config: &crate::storage::Config) -> Self {
        Self {
            period: config.progress_config(),
            event: config.event_progress_config(),
            store_read_timeout: config.store_read_timeout(),
        }
    }
}

/// Coordinates refresh tasks for every placed widget kind.
///
/// Constructed explicitly with its collaborators; share it behind an `Arc`.
pub struct RefreshScheduler<Tz: TimeZone> {
    store: Arc<dyn EventStore>,
    surface: Arc<dyn RenderSurface>,
    alarm: Arc<dyn AlarmPrimitive>,
    tz: Tz,
    settings: RwLock<RefreshSettings>,
    tasks: Mutex<BTreeMap<WidgetKind, WidgetRefreshTask>>,
}

impl<Tz> RefreshScheduler<Tz>
where
    Tz: TimeZone + Send + Sync + 'static,
    Tz::Offset: fmt::Display + Send + Sync,
{
    pub fn new(
        store: Arc<dyn EventStore>,
        surface: Arc<dyn RenderSurface>,
        alarm: Arc<dyn AlarmPrimitive>,
        tz: Tz,
        settings: RefreshSettings,
    ) -> Self {
        Self {
            store,
            surface,
            alarm,
            tz,
            settings: RwLock::new(settings),
            tasks: Mutex::new(BTreeMap::new()),
        }
    }

    fn tasks_lock(&self) -> MutexGuard<'_, BTreeMap<WidgetKind, WidgetRefreshTask>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn settings(&self) -> RefreshSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the settings. Applies from the next computation onward.
    pub fn set_config(&self, settings: RefreshSettings) {
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = settings;
    }

    /// Register a placed widget instance.
    ///
    /// The first instance of a kind creates its task and arms it to fire at
    /// `now`; later instances only bump the count. Instances of one kind share
    /// the shortest requested cadence; a shorter cadence pulls the pending
    /// alarm in to `now + cadence`.
    pub fn add_widget_instance(
        &self,
        kind: WidgetKind,
        cadence: Duration,
        now: DateTime<Utc>,
    ) -> WidgetRefreshTask {
        let mut tasks = self.tasks_lock();
        match tasks.get_mut(&kind) {
            Some(task) if task.state != TaskState::Cancelled => {
                task.instances += 1;
                if cadence < task.cadence {
                    task.cadence = cadence;
                    let sooner = boundary::next_fire_at(now, cadence, None);
                    if task.state.is_armed() && sooner < task.next_fire_at {
                        task.next_fire_at = sooner;
                        self.alarm.arm(kind, sooner);
                        debug!(%kind, next_fire_at = %sooner, "refresh task pulled in");
                    }
                }
                debug!(%kind, instances = task.instances, "widget instance added");
                task.clone()
            }
            previous => {
                let generation = previous.map_or(0, |task| task.generation + 1);
                let task = WidgetRefreshTask {
                    kind,
                    cadence,
                    next_fire_at: now,
                    last_fired_at: None,
                    instances: 1,
                    state: TaskState::Scheduled,
                    generation,
                    refresh_pending: false,
                };
                self.alarm.arm(kind, now);
                debug!(%kind, ?cadence, "refresh task scheduled");
                tasks.insert(kind, task.clone());
                task
            }
        }
    }

    /// Unregister one widget instance; the last one cancels the task.
    ///
    /// Returns the remaining instance count.
    pub fn remove_widget_instance(&self, kind: WidgetKind) -> u32 {
        let remaining = {
            let mut tasks = self.tasks_lock();
            match tasks.get_mut(&kind) {
                Some(task) if task.state != TaskState::Cancelled => {
                    task.instances = task.instances.saturating_sub(1);
                    task.instances
                }
                _ => return 0,
            }
        };
        if remaining == 0 {
            self.cancel(kind);
        }
        remaining
    }

    /// Cancel the task for `kind`. Cancelling twice, or cancelling an unknown
    /// kind, is a no-op.
    pub fn cancel(&self, kind: WidgetKind) {
        let mut tasks = self.tasks_lock();
        if let Some(task) = tasks.get_mut(&kind) {
            if task.state != TaskState::Cancelled {
                task.state = TaskState::Cancelled;
                task.instances = 0;
                self.alarm.cancel(kind);
                debug!(%kind, "refresh task cancelled");
            }
        }
    }

    pub fn task(&self, kind: WidgetKind) -> Option<WidgetRefreshTask> {
        self.tasks_lock().get(&kind).cloned()
    }

    /// The task table, ordered by kind.
    pub fn tasks(&self) -> Vec<WidgetRefreshTask> {
        self.tasks_lock().values().cloned().collect()
    }

    /// Deliver the alarm for `kind` at `now`.
    ///
    /// Computes and renders a fresh snapshot, then re-arms the alarm. A
    /// failure skips the render but still re-arms at the normal time. Late
    /// deliveries to cancelled tasks and duplicate deliveries while a fire is
    /// in progress are ignored.
    pub async fn on_fire(&self, kind: WidgetKind, now: DateTime<Utc>) -> FireOutcome {
        self.fire(kind, now, false).await
    }

    /// Refresh `kind` because the event behind it changed.
    ///
    /// Same as [`Self::on_fire`], except that a fire already in progress is
    /// told to fire again as soon as it completes, since it may have read
    /// the event before the change.
    pub async fn on_event_changed(&self, kind: WidgetKind, now: DateTime<Utc>) -> FireOutcome {
        self.fire(kind, now, true).await
    }

    async fn fire(&self, kind: WidgetKind, now: DateTime<Utc>, changed: bool) -> FireOutcome {
        let generation = {
            let mut tasks = self.tasks_lock();
            match tasks.get_mut(&kind) {
                Some(task) if task.state.is_armed() => {
                    task.state = TaskState::Fired;
                    task.last_fired_at = Some(now);
                    task.refresh_pending = false;
                    task.generation
                }
                Some(task) if changed && task.state == TaskState::Fired => {
                    task.refresh_pending = true;
                    debug!(%kind, "refresh deferred until the running fire completes");
                    return FireOutcome::Deferred;
                }
                Some(task) => {
                    debug!(%kind, state = ?task.state, "alarm ignored");
                    return FireOutcome::Ignored;
                }
                None => return FireOutcome::Ignored,
            }
        };

        let settings = self.settings();
        let computed = self.compute(kind, now, &settings).await;

        let mut tasks = self.tasks_lock();
        let Some(task) = tasks.get_mut(&kind) else {
            return FireOutcome::Ignored;
        };
        if task.state != TaskState::Fired || task.generation != generation {
            // Cancelled (and possibly placed again) while computing.
            return FireOutcome::Ignored;
        }

        let (boundary, skipped) = match computed {
            Ok((snapshot, boundary)) => {
                self.surface.render(kind, &snapshot);
                (boundary, None)
            }
            Err(e) => {
                warn!(%kind, error = %e, "refresh skipped, keeping last snapshot");
                (None, Some(e.to_string()))
            }
        };

        let next_fire_at = if std::mem::take(&mut task.refresh_pending) {
            now
        } else {
            boundary::next_fire_at(now, task.cadence, boundary)
        };
        task.next_fire_at = next_fire_at;
        task.state = TaskState::Rescheduled;
        self.alarm.arm(kind, next_fire_at);
        debug!(%kind, %next_fire_at, "refresh task rescheduled");

        match skipped {
            None => FireOutcome::Rendered { next_fire_at },
            Some(reason) => FireOutcome::Skipped {
                next_fire_at,
                reason,
            },
        }
    }

    async fn compute(
        &self,
        kind: WidgetKind,
        now: DateTime<Utc>,
        settings: &RefreshSettings,
    ) -> Result<(ProgressSnapshot, Option<DateTime<Utc>>)> {
        match kind {
            WidgetKind::Period(period) => {
                let local = now.with_timezone(&self.tz);
                let snapshot = compute_snapshot(Subject::Period(period), &local, &settings.period)?;
                let boundary = snapshot.interval.end();
                Ok((snapshot, Some(boundary)))
            }
            WidgetKind::Event(id) => {
                let event = self.read_event(id, settings.store_read_timeout).await?;
                let local = now.with_timezone(&self.tz);
                let snapshot = compute_snapshot(Subject::Event(&event), &local, &settings.event)?;
                let boundary = boundary::event_boundary(&snapshot.interval, now);
                Ok((snapshot, boundary))
            }
        }
    }

    async fn read_event(&self, id: i64, timeout: Duration) -> Result<Event> {
        let store = Arc::clone(&self.store);
        let read = tokio::task::spawn_blocking(move || store.get(id));
        match tokio::time::timeout(timeout, read).await {
            Err(_) => Err(CoreError::StoreUnavailable(DatabaseError::Timeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })),
            Ok(Err(join_error)) => Err(CoreError::StoreUnavailable(DatabaseError::QueryFailed(
                join_error.to_string(),
            ))),
            Ok(Ok(event)) => event?.ok_or(CoreError::EventNotFound(id)),
        }
    }

    /// Event widget kinds that must refresh after `change`, including ones
    /// that are firing right now.
    pub fn affected_by(&self, change: StoreChange) -> Vec<WidgetKind> {
        self.tasks_lock()
            .values()
            .filter(|task| task.state != TaskState::Cancelled)
            .filter_map(|task| match task.kind {
                WidgetKind::Event(id) if change.affects(id) => Some(task.kind),
                _ => None,
            })
            .collect()
    }

    /// Refresh every event widget affected by `change` right away.
    pub async fn on_store_change(
        &self,
        change: StoreChange,
        now: DateTime<Utc>,
    ) -> Vec<(WidgetKind, FireOutcome)> {
        let mut outcomes = Vec::new();
        for kind in self.affected_by(change) {
            outcomes.push((kind, self.on_event_changed(kind, now).await));
        }
        outcomes
    }

    /// Rebuild every live alarm after a restart.
    ///
    /// Pending alarms are dropped and each live task is re-armed to fire at
    /// `now`, so no timestamp from before the restart is trusted.
    pub fn reboot(&self, now: DateTime<Utc>) -> usize {
        let mut tasks = self.tasks_lock();
        let mut rearmed = 0;
        for task in tasks.values_mut() {
            self.alarm.cancel(task.kind);
            if task.state == TaskState::Cancelled {
                continue;
            }
            task.state = TaskState::Scheduled;
            task.next_fire_at = now;
            self.alarm.arm(task.kind, now);
            rearmed += 1;
        }
        debug!(rearmed, "refresh tasks re-armed after reboot");
        rearmed
    }
}
