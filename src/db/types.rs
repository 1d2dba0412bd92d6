//! Shared type definitions for the database layer.

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("No guest with invite code {0}")]
    GuestNotFound(String),
}

/// Current time in the storage format: RFC 3339, UTC, microsecond precision.
///
/// Fixed width keeps lexical order equal to chronological order.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// A row from the `guests` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbGuest {
    pub invite_code: String,
    pub name: String,
    pub max_adults: i64,
    pub max_kids: i64,
    pub confirmed_adults: Option<i64>,
    pub confirmed_kids: Option<i64>,
    pub dietary_info: Option<String>,
    pub message_for_us: Option<String>,
    pub song_request: Option<String>,
    pub response_country: Option<String>,
    pub response_at: Option<String>,
    /// Bumped by every response write; guards `mark_synced_if_unchanged`.
    pub response_rev: i64,
    pub sheet_row: Option<i64>,
    /// `None` while a response change is waiting to be exported.
    pub synced_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Spreadsheet-owned guest attributes applied by a roster import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterFact {
    pub invite_code: String,
    pub name: String,
    pub max_adults: i64,
    pub max_kids: i64,
    pub sheet_row: Option<i64>,
    /// Pre-populated by the sheet owners; seeds `confirmed_adults` on insert only.
    pub confirmed_adults: Option<i64>,
}

/// What a roster upsert did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
}

/// Guest-submitted response facts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseFields {
    pub confirmed_adults: Option<i64>,
    pub confirmed_kids: Option<i64>,
    #[serde(default)]
    pub dietary_info: Option<String>,
    #[serde(default)]
    pub message_for_us: Option<String>,
    #[serde(default)]
    pub song_request: Option<String>,
}

/// Event name or description in the three site languages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedText {
    /// Spanish, the sheet's default column.
    pub es: String,
    pub en: String,
    pub ca: String,
}

/// A normalized schedule event ready for storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEvent {
    pub start_time: DateTime<FixedOffset>,
    pub end_time: Option<DateTime<FixedOffset>>,
    pub location: String,
    pub name: LocalizedText,
    pub description: LocalizedText,
}

/// A row from the `schedule_events` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbScheduleEvent {
    pub id: i64,
    pub position: i64,
    pub start_time: String,
    pub end_time: Option<String>,
    pub location: String,
    pub name: LocalizedText,
    pub description: LocalizedText,
}

/// Result of a full schedule replace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaceSummary {
    pub deleted: usize,
    pub inserted: usize,
    pub failed: usize,
}
