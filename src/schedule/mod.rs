//! Schedule ingestion: sheet rows to normalized events, full replace.

pub mod parse;

use chrono_tz::Tz;

use crate::error::{ConfigError, SyncError};
use crate::sheets::SheetSource;
use crate::state::SharedDb;
use crate::types::ScheduleConfig;

pub use parse::{parse_schedule_rows, parse_time_of_day};

/// Resolved schedule settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleSettings {
    /// Year applied to day headers, which carry only month and day.
    pub wedding_year: i32,
    pub timezone: Tz,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            wedding_year: 2026,
            timezone: chrono_tz::America::Tegucigalpa,
        }
    }
}

impl ScheduleSettings {
    pub fn from_config(config: &ScheduleConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            wedding_year: config.wedding_year,
            timezone: config.venue_timezone()?,
        })
    }
}

/// Counts from one schedule ingest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleSummary {
    pub rows_read: usize,
    pub events: usize,
    pub deleted: usize,
    pub inserted: usize,
    pub failed: usize,
}

/// Read the schedule sheet and replace the stored schedule with it.
///
/// Returns `None` without touching the store when the source is not
/// configured. A configured source with no public events empties the table.
pub async fn sync_schedule(
    db: &SharedDb,
    sheet: &dyn SheetSource,
    settings: &ScheduleSettings,
) -> Result<Option<ScheduleSummary>, SyncError> {
    if !sheet.is_configured() {
        log::debug!("Schedule: source not configured; keeping stored events");
        return Ok(None);
    }

    let rows = sheet.read_schedule().await?;
    let events = parse_schedule_rows(&rows, settings.wedding_year, settings.timezone);

    let replaced = db.lock().replace_schedule(&events)?;

    let summary = ScheduleSummary {
        rows_read: rows.len(),
        events: events.len(),
        deleted: replaced.deleted,
        inserted: replaced.inserted,
        failed: replaced.failed,
    };
    log::info!(
        "Schedule: {} rows read, {} public events stored ({} replaced, {} failed)",
        summary.rows_read,
        summary.inserted,
        summary.deleted,
        summary.failed
    );
    Ok(Some(summary))
}
