use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Service configuration.
///
/// Loaded from `~/.rsvp-sync/config.json` (camelCase keys, every field
/// optional), then overridden by environment variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// SQLite database path; defaults to `~/.rsvp-sync/rsvp.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
    #[serde(default)]
    pub sheets: SheetsConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spreadsheet_id: Option<String>,
    #[serde(default = "default_guest_sheet_name")]
    pub guest_sheet_name: String,
    #[serde(default = "default_schedule_sheet_name")]
    pub schedule_sheet_name: String,
    /// Service-account key or authorized-user credentials file.
    #[serde(default, alias = "tokenPath", skip_serializing_if = "Option::is_none")]
    pub credentials_path: Option<String>,
    /// The same credentials as inline JSON; the file wins when both are set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_json: Option<String>,
}

fn default_guest_sheet_name() -> String {
    "Guests".to_string()
}

fn default_schedule_sheet_name() -> String {
    "Schedule".to_string()
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: None,
            guest_sheet_name: default_guest_sheet_name(),
            schedule_sheet_name: default_schedule_sheet_name(),
            credentials_path: None,
            credentials_json: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    /// Humantime interval between cycles, e.g. `5m` or `90s`.
    #[serde(default = "default_sync_interval")]
    pub interval: String,
    /// Only this region runs the sync worker. Unset means every region does.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_region: Option<String>,
}

fn default_sync_interval() -> String {
    "5m".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: default_sync_interval(),
            primary_region: None,
            current_region: None,
        }
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Result<Duration, ConfigError> {
        let interval = humantime::parse_duration(self.interval.trim()).map_err(|e| {
            ConfigError::InvalidValue {
                key: "sync.interval",
                message: format!("'{}': {}", self.interval, e),
            }
        })?;
        if interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "sync.interval",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(interval)
    }

    /// True unless both regions are known and differ.
    pub fn is_primary_region(&self) -> bool {
        match (&self.primary_region, &self.current_region) {
            (Some(primary), Some(current)) => primary.trim() == current.trim(),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleConfig {
    #[serde(default = "default_wedding_year")]
    pub wedding_year: i32,
    /// IANA name of the venue timezone.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_wedding_year() -> i32 {
    2026
}

fn default_timezone() -> String {
    "America/Tegucigalpa".to_string()
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            wedding_year: default_wedding_year(),
            timezone: default_timezone(),
        }
    }
}

impl ScheduleConfig {
    pub fn venue_timezone(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .trim()
            .parse::<Tz>()
            .map_err(|e| ConfigError::InvalidValue {
                key: "schedule.timezone",
                message: format!("'{}': {}", self.timezone, e),
            })
    }
}

/// Treat blank environment values as unset.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Apply environment overrides. `lookup` is `std::env::var(..).ok()` in
    /// production.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let var = |key: &str| non_blank(lookup(key));

        if let Some(path) = var("DB_PATH") {
            self.db_path = Some(path);
        }
        if let Some(id) = var("GOOGLE_SHEET_ID") {
            self.sheets.spreadsheet_id = Some(id);
        }
        if let Some(name) = var("GOOGLE_SHEET_NAME") {
            self.sheets.guest_sheet_name = name;
        }
        if let Some(name) = var("GOOGLE_SCHEDULE_SHEET_NAME") {
            self.sheets.schedule_sheet_name = name;
        }
        if let Some(path) = var("GOOGLE_APPLICATION_CREDENTIALS") {
            self.sheets.credentials_path = Some(path);
        }
        if let Some(json) = var("GOOGLE_SHEETS_CREDENTIALS") {
            self.sheets.credentials_json = Some(json);
        }
        if let Some(interval) = var("SHEETS_SYNC_INTERVAL") {
            self.sync.interval = interval;
        }
        if let Some(region) = var("PRIMARY_REGION") {
            self.sync.primary_region = Some(region);
        }
        if let Some(region) = var("FLY_REGION") {
            self.sync.current_region = Some(region);
        }
        if let Some(year) = var("WEDDING_YEAR") {
            self.schedule.wedding_year =
                year.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "WEDDING_YEAR",
                    message: format!("'{}' is not a year", year),
                })?;
        }
        if let Some(tz) = var("VENUE_TIMEZONE") {
            self.schedule.timezone = tz;
        }
        Ok(())
    }

    /// Reject values that would only fail later, inside the worker.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sync.interval()?;
        self.schedule.venue_timezone()?;
        Ok(())
    }

    pub fn db_path(&self) -> Option<PathBuf> {
        self.db_path.as_ref().map(PathBuf::from)
    }
}
