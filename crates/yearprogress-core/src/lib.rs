//! # Year Progress Core Library
//!
//! This library provides the time-progress computation and widget refresh
//! scheduling behind Year Progress. It follows a CLI-first philosophy: every
//! operation is available through the standalone `yearprogress` binary, and
//! any widget host is a thin layer over the same core library.
//!
//! ## Architecture
//!
//! - **Period Model**: resolves day, week, month, and year to concrete
//!   intervals in the caller's timezone
//! - **Recurrence Expander**: finds the next occurrence of weekly, monthly,
//!   and yearly events
//! - **Progress Engine**: pure computation of immutable progress snapshots
//! - **Refresh Scheduler**: per-widget one-shot alarms, re-armed on every
//!   fire at `min(now + cadence, next natural boundary)`
//! - **Storage**: SQLite event store and TOML configuration
//!
//! ## Key Components
//!
//! - [`CalendarPeriod`]: Day, week, month, or year
//! - [`compute_snapshot`]: Progress of a period or event at an instant
//! - [`RefreshScheduler`]: Widget refresh coordinator
//! - [`EventStore`]: Event persistence seam, implemented by [`Database`]
//! - [`Config`]: Application configuration management

pub mod error;
pub mod event;
pub mod period;
pub mod progress;
pub mod recurrence;
pub mod scheduler;
pub mod storage;
pub mod store;

pub use error::{ConfigError, CoreError, DatabaseError, Result, ValidationError};
pub use event::Event;
pub use period::{CalendarPeriod, Interval};
pub use progress::{compute_snapshot, CalculationType, ProgressConfig, ProgressSnapshot, Subject};
pub use recurrence::{next_occurrence, RecurrenceRule, WeekdaySet};
pub use scheduler::{
    spawn_driver, AlarmClock, AlarmPrimitive, FireOutcome, RefreshScheduler, RefreshSettings,
    RenderSurface, SnapshotBoard, TaskState, WidgetKind, WidgetRefreshTask,
};
pub use storage::{Config, Database};
pub use store::{EventStore, MemoryStore, StoreChange};
