//! Bidirectional sync between the wedding guest spreadsheet and the local
//! RSVP store.
//!
//! The sheet owns the roster and the schedule; the store owns guest
//! responses. `scheduler::run_sync_worker` drives import, export and schedule
//! ingestion on one task.

pub mod db;
pub mod error;
pub mod google_api;
mod migrations;
pub mod reconcile;
pub mod schedule;
pub mod scheduler;
pub mod sheets;
pub mod state;
pub mod types;

pub use error::{ConfigError, SyncError};
pub use scheduler::{run_cycle, run_sync_worker, sync_once, CycleReport, SyncHandle};
pub use state::{AppState, SharedDb};
