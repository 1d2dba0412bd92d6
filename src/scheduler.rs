//! Sync worker: one task runs every reconciliation cycle.
//!
//! Two wake sources feed the worker:
//! - a fixed interval (first tick fires immediately, so a cycle runs at startup)
//! - on-demand requests from `SyncHandle`, coalesced in a channel of capacity 1
//!
//! Cycles never overlap. Shutdown is observed between cycles only; a running
//! cycle always finishes.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::error::SyncError;
use crate::reconcile::{self, ExportSummary, ImportSummary};
use crate::schedule::{self, ScheduleSummary};
use crate::state::AppState;

/// Queued on-demand requests. One slot: a pending request absorbs later ones.
const SYNC_SIGNAL_CAPACITY: usize = 1;

/// Cloneable trigger for an on-demand sync.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    tx: mpsc::Sender<()>,
}

impl SyncHandle {
    /// Ask the worker to run a cycle soon. Never blocks.
    ///
    /// Returns false when a request is already queued (coalesced) or the
    /// worker is gone.
    pub fn request_sync_soon(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(())) => {
                log::debug!("Sync request coalesced with a queued one");
                false
            }
            Err(mpsc::error::TrySendError::Closed(())) => false,
        }
    }
}

/// Receiving side of `SyncHandle`, consumed by the worker.
#[derive(Debug)]
pub struct SyncSignals {
    rx: mpsc::Receiver<()>,
}

pub fn sync_channel() -> (SyncHandle, SyncSignals) {
    let (tx, rx) = mpsc::channel(SYNC_SIGNAL_CAPACITY);
    (SyncHandle { tx }, SyncSignals { rx })
}

/// Outcome of one import → export → schedule cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub import: Option<ImportSummary>,
    pub export: Option<ExportSummary>,
    /// `None` if the stage failed or the source was not configured.
    pub schedule: Option<ScheduleSummary>,
    pub failed_stages: Vec<&'static str>,
}

impl CycleReport {
    pub fn is_clean(&self) -> bool {
        self.failed_stages.is_empty()
    }
}

fn log_stage_error(stage: &str, err: &SyncError) {
    if err.is_retryable() {
        log::warn!("Sync {} failed: {} (will retry next cycle)", stage, err);
    } else {
        log::error!("Sync {} failed: {}. {}", stage, err, err.recovery_suggestion());
    }
}

/// Run one full cycle. A failing stage is logged and the rest still run.
pub async fn run_cycle(state: &AppState) -> CycleReport {
    let mut report = CycleReport::default();
    let sheet = state.sheet.as_ref();

    match reconcile::sync_from_sheet(&state.db, sheet).await {
        Ok(summary) => report.import = Some(summary),
        Err(e) => {
            log_stage_error("import", &e);
            report.failed_stages.push("import");
        }
    }

    match reconcile::sync_to_sheet(&state.db, sheet).await {
        Ok(summary) => report.export = Some(summary),
        Err(e) => {
            log_stage_error("export", &e);
            report.failed_stages.push("export");
        }
    }

    match schedule::sync_schedule(&state.db, sheet, &state.schedule).await {
        Ok(summary) => report.schedule = summary,
        Err(e) => {
            log_stage_error("schedule", &e);
            report.failed_stages.push("schedule");
        }
    }

    report
}

fn log_secondary_region(state: &AppState, what: &str) {
    log::info!(
        "{}: region {} is not primary region {}; sync disabled here",
        what,
        state.config.sync.current_region.as_deref().unwrap_or("?"),
        state.config.sync.primary_region.as_deref().unwrap_or("?")
    );
}

/// Run exactly one cycle now, for the `once` command.
///
/// Outside the primary region nothing runs and an empty report is returned.
pub async fn sync_once(state: &AppState) -> Result<CycleReport, SyncError> {
    if !state.config.sync.is_primary_region() {
        log_secondary_region(state, "One-shot sync");
        return Ok(CycleReport::default());
    }
    if !state.sheet.is_configured() {
        return Err(SyncError::NotConfigured);
    }
    Ok(run_cycle(state).await)
}

/// Worker loop. Returns the number of cycles run.
///
/// Exits immediately (after one log line) when the source is unconfigured or
/// this instance is not in the primary region. Otherwise runs until the
/// shutdown flag turns true or its sender is dropped.
pub async fn run_sync_worker(
    state: Arc<AppState>,
    mut signals: SyncSignals,
    mut shutdown: watch::Receiver<bool>,
) -> usize {
    if !state.sheet.is_configured() {
        log::warn!("Sync worker: spreadsheet not configured; sync disabled");
        return 0;
    }
    if !state.config.sync.is_primary_region() {
        log_secondary_region(&state, "Sync worker");
        return 0;
    }

    log::info!("Sync worker: started (interval {:?})", state.sync_interval);

    let mut ticker = tokio::time::interval(state.sync_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // A closed signal channel would otherwise resolve `recv` forever
    let mut signals_open = true;
    let mut cycles = 0;

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() {
                    log::debug!("Sync worker: shutdown sender dropped");
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {
                log::debug!("Sync worker: interval tick");
            }
            request = signals.rx.recv(), if signals_open => {
                match request {
                    Some(()) => log::debug!("Sync worker: woken by sync request"),
                    None => {
                        signals_open = false;
                        continue;
                    }
                }
            }
        }

        let report = run_cycle(&state).await;
        cycles += 1;
        if !report.is_clean() {
            log::warn!(
                "Sync worker: cycle {} finished with failed stages: {:?}",
                cycles,
                report.failed_stages
            );
        }
    }

    log::info!("Sync worker: stopped after {} cycles", cycles);
    cycles
}
