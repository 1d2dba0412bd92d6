//! SQLite-backed store for guest responses and the published schedule.
//!
//! The database is the source of truth for guest responses; the spreadsheet
//! owns the roster and the schedule. Guest rows carry a `synced_at` dirty
//! marker that the reconciler uses to push responses back to the sheet.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};

mod guests;
mod schedule;
pub mod types;
pub use types::*;

/// Writers wait this long on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite connection wrapper for guest and schedule state.
///
/// This is intentionally NOT `Clone` or `Sync`. It is shared behind a mutex
/// in `AppState`; SQLite serializes writers, and one connection keeps every
/// mutation on a single writer.
pub struct RsvpDb {
    conn: Connection,
}

impl RsvpDb {
    /// Borrow the underlying connection for ad-hoc queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// Execute a closure within a SQLite transaction.
    /// Commits on Ok, rolls back on Err.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Self) -> Result<T, DbError>,
    {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| DbError::Transaction(format!("Failed to begin transaction: {e}")))?;
        match f(self) {
            Ok(val) => {
                if let Err(e) = self.conn.execute_batch("COMMIT") {
                    let _ = self.conn.execute_batch("ROLLBACK");
                    return Err(DbError::Transaction(format!(
                        "Failed to commit transaction: {e}"
                    )));
                }
                Ok(val)
            }
            Err(e) => {
                if let Err(rollback_err) = self.conn.execute_batch("ROLLBACK") {
                    log::error!("Rollback failed after {}: {}", e, rollback_err);
                }
                Err(e)
            }
        }
    }

    /// Open (or create) the database at `~/.rsvp-sync/rsvp.db`.
    pub fn open() -> Result<Self, DbError> {
        let path = Self::default_path()?;
        Self::open_at(path)
    }

    /// Open a database at an explicit path and apply pending migrations.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;

        // Enable WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        let applied = crate::migrations::run_migrations(&conn).map_err(DbError::Migration)?;
        if applied > 0 {
            log::info!("Applied {} schema migration(s) to {}", applied, path.display());
        }

        Ok(Self { conn })
    }

    /// Open a database in read-only mode for readers that run alongside the
    /// sync worker's writer connection.
    pub fn open_readonly_at(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self { conn })
    }

    /// Resolve the default database path: `~/.rsvp-sync/rsvp.db`.
    pub fn default_path() -> Result<PathBuf, DbError> {
        let home = dirs::home_dir().ok_or(DbError::HomeDirNotFound)?;
        Ok(home.join(".rsvp-sync").join("rsvp.db"))
    }
}

// =============================================================================
// Shared test utilities
// =============================================================================
