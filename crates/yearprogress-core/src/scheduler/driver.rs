//! Background loop that delivers [`AlarmClock`] alarms to a scheduler.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{AlarmClock, RefreshScheduler, WidgetKind};
use crate::store::StoreChange;

/// Sleep used when no alarm is armed. Arming wakes the loop early.
const IDLE_WAKE: Duration = Duration::from_secs(60);

/// Spawn the refresh loop.
///
/// The loop sleeps until the earliest pending alarm, delivers every due alarm
/// on its own task so a slow store read never delays a sibling, refreshes
/// event widgets as soon as the store reports a change, and exits when
/// `shutdown` is cancelled. In-flight fires are awaited before exiting.
pub fn spawn_driver<Tz>(
    scheduler: Arc<RefreshScheduler<Tz>>,
    alarms: Arc<AlarmClock>,
    mut changes: broadcast::Receiver<StoreChange>,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    Tz: TimeZone + Send + Sync + 'static,
    Tz::Offset: fmt::Display + Send + Sync,
{
    tokio::spawn(async move {
        info!(tasks = scheduler.tasks().len(), "widget refresh driver started");
        let mut in_flight: JoinSet<()> = JoinSet::new();
        let mut feed_open = true;

        loop {
            let now = Utc::now();
            for kind in alarms.take_due(now) {
                fire(&mut in_flight, &scheduler, kind);
            }

            let sleep_for = alarms
                .next_wake()
                .map(|at| (at - Utc::now()).to_std().unwrap_or(Duration::ZERO))
                .unwrap_or(IDLE_WAKE);

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(sleep_for) => {}
                _ = alarms.changed() => {}
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "refresh task panicked");
                    }
                }
                change = changes.recv(), if feed_open => match change {
                    Ok(change) => {
                        debug!(?change, "store changed");
                        for kind in scheduler.affected_by(change) {
                            refresh(&mut in_flight, &scheduler, kind);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "store change feed lagged, refreshing every event widget");
                        for kind in scheduler.affected_by(StoreChange::Cleared) {
                            refresh(&mut in_flight, &scheduler, kind);
                        }
                    }
                    Err(RecvError::Closed) => {
                        debug!("store change feed closed");
                        feed_open = false;
                    }
                },
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "refresh task panicked");
            }
        }
        info!("widget refresh driver stopped");
    })
}

fn fire<Tz>(in_flight: &mut JoinSet<()>, scheduler: &Arc<RefreshScheduler<Tz>>, kind: WidgetKind)
where
    Tz: TimeZone + Send + Sync + 'static,
    Tz::Offset: fmt::Display + Send + Sync,
{
    let scheduler = Arc::clone(scheduler);
    in_flight.spawn(async move {
        let outcome = scheduler.on_fire(kind, Utc::now()).await;
        debug!(%kind, ?outcome, "alarm delivered");
    });
}

fn refresh<Tz>(in_flight: &mut JoinSet<()>, scheduler: &Arc<RefreshScheduler<Tz>>, kind: WidgetKind)
where
    Tz: TimeZone + Send + Sync + 'static,
    Tz::Offset: fmt::Display + Send + Sync,
{
    let scheduler = Arc::clone(scheduler);
    in_flight.spawn(async move {
        let outcome = scheduler.on_event_changed(kind, Utc::now()).await;
        debug!(%kind, ?outcome, "store change delivered");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::CalendarPeriod;
    use crate::scheduler::{RefreshSettings, SnapshotBoard, TaskState};
    use crate::store::{EventStore, MemoryStore};
    use crate::Event;

    async fn wait_for(mut check: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn driver_renders_placed_widgets_and_stops() {
        let store = Arc::new(MemoryStore::new());
        let board = Arc::new(SnapshotBoard::new());
        let alarms = Arc::new(AlarmClock::new());
        let scheduler = Arc::new(RefreshScheduler::new(
            store.clone(),
            board.clone(),
            alarms.clone(),
            Utc,
            RefreshSettings::default(),
        ));
        let shutdown = CancellationToken::new();
        let handle = spawn_driver(
            scheduler.clone(),
            alarms.clone(),
            store.subscribe(),
            shutdown.clone(),
        );

        let year = WidgetKind::Period(CalendarPeriod::Year);
        scheduler.add_widget_instance(year, Duration::from_secs(60), Utc::now());
        wait_for(|| board.latest(year).is_some()).await;
        assert_eq!(scheduler.task(year).unwrap().state, TaskState::Rescheduled);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn store_change_triggers_refresh() {
        let store = Arc::new(MemoryStore::new());
        let board = Arc::new(SnapshotBoard::new());
        let alarms = Arc::new(AlarmClock::new());
        let now = Utc::now();
        let event = store
            .add(Event::new(
                "Sprint",
                "",
                now - chrono::Duration::days(1),
                now + chrono::Duration::days(1),
            ))
            .unwrap();
        let kind = WidgetKind::Event(event.id);

        let scheduler = Arc::new(RefreshScheduler::new(
            store.clone(),
            board.clone(),
            alarms.clone(),
            Utc,
            RefreshSettings::default(),
        ));
        let shutdown = CancellationToken::new();
        let handle = spawn_driver(
            scheduler.clone(),
            alarms.clone(),
            store.subscribe(),
            shutdown.clone(),
        );

        scheduler.add_widget_instance(kind, Duration::from_secs(3600), Utc::now());
        wait_for(|| board.latest(kind).is_some()).await;

        let mut renamed = event.clone();
        renamed.title = "Sprint 2".into();
        store.update(&renamed).unwrap();
        wait_for(|| board.latest(kind).is_some_and(|s| s.title == "Sprint 2")).await;

        shutdown.cancel();
        handle.await.unwrap();
    }
}
