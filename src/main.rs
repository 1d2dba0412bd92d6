//! rsvp-sync: spreadsheet ↔ RSVP store sync service.
//!
//! Usage:
//! - `rsvp-sync` or `rsvp-sync run`: run the sync worker until Ctrl-C
//! - `rsvp-sync once`: run one cycle and exit
//!
//! Configuration comes from `~/.rsvp-sync/config.json` (or `RSVP_SYNC_CONFIG`)
//! and environment variables; `RUST_LOG` controls log output. Google
//! credentials come from `GOOGLE_APPLICATION_CREDENTIALS` (a service-account
//! key or authorized-user file) or inline `GOOGLE_SHEETS_CREDENTIALS`.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;

use rsvp_sync::sheets::{GoogleSheetSource, SheetSource};
use rsvp_sync::state::{load_config, open_db};
use rsvp_sync::{run_sync_worker, sync_once, AppState};

enum Command {
    Run,
    Once,
}

fn parse_command() -> anyhow::Result<Command> {
    match std::env::args().nth(1).as_deref() {
        None | Some("run") => Ok(Command::Run),
        Some("once") => Ok(Command::Once),
        Some(other) => anyhow::bail!("unknown command '{other}' (expected 'run' or 'once')"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let command = parse_command()?;
    let config = load_config().context("Failed to load rsvp-sync config")?;
    let db = open_db(&config).context("Failed to open database")?;
    let sheet: Arc<dyn SheetSource> = Arc::new(
        GoogleSheetSource::from_config(&config.sheets)
            .context("Failed to set up Google Sheets access")?,
    );

    let (state, signals) = AppState::new(config, db, sheet)?;
    let state = Arc::new(state);

    match command {
        Command::Once => {
            let report = sync_once(&state).await?;
            if !report.is_clean() {
                anyhow::bail!("sync finished with failed stages: {:?}", report.failed_stages);
            }
            log::info!("One-shot sync complete");
        }
        Command::Run => {
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let worker = tokio::spawn(run_sync_worker(state.clone(), signals, shutdown_rx));

            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            log::info!("Shutdown requested; waiting for the current cycle to finish");
            let _ = shutdown_tx.send(true);

            let cycles = worker.await.context("Sync worker panicked")?;
            log::info!("rsvp-sync stopped after {} cycles", cycles);
        }
    }

    Ok(())
}
