//! Spreadsheet data source.
//!
//! `SheetSource` is the seam between the reconciler and the spreadsheet. The
//! production implementation talks to Google Sheets; tests use the in-memory
//! `FakeSheet` from `test_utils`.

pub mod columns;

use std::path::Path;

use async_trait::async_trait;

use crate::db::DbGuest;
use crate::error::{ConfigError, SyncError};
use crate::google_api::credentials::Credentials;
use crate::google_api::sheets::SheetsClient;
use crate::types::SheetsConfig;

/// One guest sheet row as read, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RosterRow {
    pub sheet_row: i64,
    pub invite_code: String,
    pub name: String,
    pub couple_flag: String,
    pub kid_count: i64,
    /// Pre-populated confirmed adults, if the cell is non-blank.
    pub confirmed_adults: Option<i64>,
}

impl RosterRow {
    /// 2 for a couple invite, otherwise 1.
    pub fn max_adults(&self) -> i64 {
        if columns::is_couple_flag(&self.couple_flag) {
            2
        } else {
            1
        }
    }
}

/// Response cells written to columns I..O of a guest row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResponseRow {
    pub confirmed_adults: Option<i64>,
    pub confirmed_kids: Option<i64>,
    pub dietary_info: Option<String>,
    pub message_for_us: Option<String>,
    pub song_request: Option<String>,
    pub response_country: Option<String>,
    pub response_at: Option<String>,
}

impl From<&DbGuest> for ResponseRow {
    fn from(guest: &DbGuest) -> Self {
        Self {
            confirmed_adults: guest.confirmed_adults,
            confirmed_kids: guest.confirmed_kids,
            dietary_info: guest.dietary_info.clone(),
            message_for_us: guest.message_for_us.clone(),
            song_request: guest.song_request.clone(),
            response_country: guest.response_country.clone(),
            response_at: guest.response_at.clone(),
        }
    }
}

/// One schedule sheet row as text cells.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawScheduleRow {
    pub start_time: String,
    pub end_time: String,
    pub public: String,
    pub name_es: String,
    /// Internal owner column; never published.
    pub team: String,
    pub location: String,
    pub description_es: String,
    pub name_en: String,
    pub name_ca: String,
    pub description_en: String,
    pub description_ca: String,
}

/// Read/write access to the guest and schedule sheets.
#[async_trait]
pub trait SheetSource: Send + Sync {
    /// False when credentials or the spreadsheet id are missing.
    fn is_configured(&self) -> bool;

    /// Every non-blank guest row. Empty if unconfigured.
    async fn read_roster(&self) -> Result<Vec<RosterRow>, SyncError>;

    /// Overwrite the response cells of one guest row. No-op if unconfigured.
    async fn write_response(&self, sheet_row: i64, response: &ResponseRow) -> Result<(), SyncError>;

    /// Every schedule row in sheet order. Empty if unconfigured.
    async fn read_schedule(&self) -> Result<Vec<RawScheduleRow>, SyncError>;
}

/// Google Sheets backed source.
pub struct GoogleSheetSource {
    client: Option<SheetsClient>,
    guest_sheet: String,
    schedule_sheet: String,
}

impl GoogleSheetSource {
    /// Build from configuration.
    ///
    /// A missing spreadsheet id or missing credentials yield an unconfigured
    /// source so the rest of the service still runs. Credentials that are
    /// present but unusable are a startup error. The credentials file wins
    /// over inline JSON.
    pub fn from_config(config: &SheetsConfig) -> Result<Self, ConfigError> {
        let unconfigured = Self {
            client: None,
            guest_sheet: config.guest_sheet_name.clone(),
            schedule_sheet: config.schedule_sheet_name.clone(),
        };

        let Some(id) = config
            .spreadsheet_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
        else {
            log::warn!("Google Sheets not configured (GOOGLE_SHEET_ID not set); sync disabled");
            return Ok(unconfigured);
        };

        let credentials = match (&config.credentials_path, &config.credentials_json) {
            (Some(path), _) => {
                log::info!("Using Google credentials from file: {}", path);
                Credentials::from_file(Path::new(path))?
            }
            (None, Some(json)) => {
                log::info!("Using Google credentials from GOOGLE_SHEETS_CREDENTIALS");
                Credentials::from_json(json)?
            }
            (None, None) => {
                log::warn!(
                    "No Google credentials configured (GOOGLE_APPLICATION_CREDENTIALS or GOOGLE_SHEETS_CREDENTIALS); sync disabled"
                );
                return Ok(unconfigured);
            }
        };

        let kind = credentials.kind();
        let client = SheetsClient::new(id, credentials)?;
        log::info!(
            "Google Sheets sync configured for spreadsheet {} with {} credentials (sheets '{}', '{}')",
            id,
            kind,
            config.guest_sheet_name,
            config.schedule_sheet_name
        );

        Ok(Self {
            client: Some(client),
            ..unconfigured
        })
    }
}

#[async_trait]
impl SheetSource for GoogleSheetSource {
    fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    async fn read_roster(&self) -> Result<Vec<RosterRow>, SyncError> {
        let Some(client) = &self.client else {
            return Ok(Vec::new());
        };
        let values = client
            .get_values(&columns::roster_read_range(&self.guest_sheet))
            .await?;
        let rows = columns::parse_roster_values(&values);
        log::info!("Read {} guest rows from sheet '{}'", rows.len(), self.guest_sheet);
        Ok(rows)
    }

    async fn write_response(&self, sheet_row: i64, response: &ResponseRow) -> Result<(), SyncError> {
        let Some(client) = &self.client else {
            return Ok(());
        };
        if sheet_row < columns::FIRST_DATA_ROW {
            return Err(SyncError::Parse(format!(
                "sheet row {} is above the first data row",
                sheet_row
            )));
        }
        let range = columns::response_write_range(&self.guest_sheet, sheet_row);
        client
            .update_values(&range, &[columns::response_values(response)])
            .await?;
        Ok(())
    }

    async fn read_schedule(&self) -> Result<Vec<RawScheduleRow>, SyncError> {
        let Some(client) = &self.client else {
            return Ok(Vec::new());
        };
        let values = client
            .get_values(&columns::schedule_read_range(&self.schedule_sheet))
            .await?;
        Ok(columns::parse_schedule_values(&values))
    }
}

// =============================================================================
// Shared test utilities
// =============================================================================
