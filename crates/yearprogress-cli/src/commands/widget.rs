//! Widget placement and the foreground refresh loop.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Utc};
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use yearprogress_core::storage::MIN_CADENCE_SECS;
use yearprogress_core::{
    spawn_driver, AlarmClock, Config, Database, EventStore, ProgressSnapshot, RefreshScheduler,
    RefreshSettings, RenderSurface, WidgetKind,
};

use super::{print_json, CliResult};

/// `kv` key holding the placed widgets.
const PLACEMENTS_KEY: &str = "widget_placements";

#[derive(Subcommand)]
pub enum WidgetAction {
    /// Place a widget instance (day, week, month, year, or event:<id>)
    Place {
        kind: WidgetKind,
        /// Refresh cadence in seconds (defaults to the configured cadence)
        #[arg(long)]
        cadence: Option<u64>,
    },
    /// Remove one instance of a placed widget
    Remove { kind: WidgetKind },
    /// List placed widgets
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the refresh loop, printing each rendered snapshot as a JSON line
    Run {
        /// Stop after this many renders
        #[arg(long)]
        max_fires: Option<usize>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Placement {
    instances: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cadence_secs: Option<u64>,
}

type Placements = BTreeMap<WidgetKind, Placement>;

fn load_placements(db: &Database) -> Result<Placements, Box<dyn std::error::Error>> {
    match db.kv_get(PLACEMENTS_KEY)? {
        Some(json) => Ok(serde_json::from_str(&json)?),
        None => Ok(Placements::new()),
    }
}

fn save_placements(db: &Database, placements: &Placements) -> CliResult {
    db.kv_set(PLACEMENTS_KEY, &serde_json::to_string(placements)?)?;
    Ok(())
}

pub fn run(action: WidgetAction) -> CliResult {
    let db = Database::open()?;

    match action {
        WidgetAction::Place { kind, cadence } => {
            if let WidgetKind::Event(id) = kind {
                if db.get(id)?.is_none() {
                    return Err(format!("Event {id} not found").into());
                }
            }
            if cadence.is_some_and(|secs| secs < MIN_CADENCE_SECS) {
                return Err(format!("cadence must be at least {MIN_CADENCE_SECS}s").into());
            }

            let mut placements = load_placements(&db)?;
            let placement = placements.entry(kind).or_insert(Placement {
                instances: 0,
                cadence_secs: None,
            });
            placement.instances += 1;
            if let Some(secs) = cadence {
                placement.cadence_secs = Some(placement.cadence_secs.map_or(secs, |c| c.min(secs)));
            }
            let instances = placement.instances;
            save_placements(&db, &placements)?;
            println!("placed {kind} (instances: {instances})");
        }
        WidgetAction::Remove { kind } => {
            let mut placements = load_placements(&db)?;
            let Some(placement) = placements.get_mut(&kind) else {
                return Err(format!("widget {kind} is not placed").into());
            };
            placement.instances = placement.instances.saturating_sub(1);
            let left = placement.instances;
            if left == 0 {
                placements.remove(&kind);
            }
            save_placements(&db, &placements)?;
            println!("removed {kind} (instances left: {left})");
        }
        WidgetAction::List { json } => {
            let placements = load_placements(&db)?;
            if json {
                return print_json(&placements);
            }
            if placements.is_empty() {
                println!("no widgets placed");
            }
            let config = Config::load()?;
            for (kind, placement) in &placements {
                let cadence = placement
                    .cadence_secs
                    .map(Duration::from_secs)
                    .unwrap_or_else(|| config.cadence(*kind));
                println!(
                    "{kind:<10} instances: {}  cadence: {}s",
                    placement.instances,
                    cadence.as_secs()
                );
            }
        }
        WidgetAction::Run { max_fires } => {
            let placements = load_placements(&db)?;
            if placements.is_empty() {
                return Err("no widgets placed; use `yearprogress widget place <kind>`".into());
            }
            let config = Config::load()?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(run_loop(db, config, placements, max_fires))?;
        }
    }
    Ok(())
}

/// Prints every rendered snapshot as one JSON line on stdout.
struct JsonLinesSurface {
    rendered: AtomicUsize,
    limit: Option<usize>,
    done: CancellationToken,
}

#[derive(Serialize)]
struct RenderLine<'a> {
    widget: WidgetKind,
    snapshot: &'a ProgressSnapshot,
}

impl RenderSurface for JsonLinesSurface {
    fn render(&self, kind: WidgetKind, snapshot: &ProgressSnapshot) {
        let count = self.rendered.fetch_add(1, Ordering::SeqCst) + 1;
        if self.limit.is_some_and(|limit| count > limit) {
            return;
        }
        let line = RenderLine {
            widget: kind,
            snapshot,
        };
        let written = serde_json::to_string(&line)
            .map_err(std::io::Error::from)
            .and_then(|json| write_line(&mut std::io::stdout().lock(), &json));
        if let Err(e) = written {
            warn!(%kind, error = %e, "cannot write snapshot, stopping refresh loop");
            self.done.cancel();
            return;
        }
        if self.limit.is_some_and(|limit| count >= limit) {
            self.done.cancel();
        }
    }
}

fn write_line(out: &mut impl Write, line: &str) -> std::io::Result<()> {
    writeln!(out, "{line}")?;
    out.flush()
}

async fn run_loop(
    db: Database,
    config: Config,
    placements: Placements,
    max_fires: Option<usize>,
) -> CliResult {
    let db = Arc::new(db);
    let alarms = Arc::new(AlarmClock::new());
    let shutdown = CancellationToken::new();
    let surface = Arc::new(JsonLinesSurface {
        rendered: AtomicUsize::new(0),
        limit: max_fires,
        done: shutdown.clone(),
    });
    let scheduler = Arc::new(RefreshScheduler::new(
        db.clone(),
        surface,
        alarms.clone(),
        Local,
        RefreshSettings::from(&config),
    ));

    let now = Utc::now();
    for (kind, placement) in &placements {
        let cadence = placement
            .cadence_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| config.cadence(*kind));
        for _ in 0..placement.instances {
            scheduler.add_widget_instance(*kind, cadence, now);
        }
    }
    info!(widgets = placements.len(), "starting refresh loop");

    let driver = spawn_driver(scheduler, alarms, db.subscribe(), shutdown.clone());
    tokio::select! {
        _ = shutdown.cancelled() => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            shutdown.cancel();
        }
    }
    driver.await?;
    Ok(())
}
