//! Error types for sync cycles
//!
//! Errors are classified by how the scheduler reacts to them:
//! - Retryable: transport failures and store transaction failures; the next
//!   cycle tries again
//! - Row-level: parse errors, logged and skipped inside a batch
//! - Disabling: missing credentials, reported once at startup

use thiserror::Error;

use crate::db::DbError;
use crate::google_api::GoogleApiError;

/// Error taxonomy for the reconciliation engine.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Spreadsheet sync is not configured")]
    NotConfigured,

    #[error("Spreadsheet transport error: {0}")]
    Transport(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invite not found: {0}")]
    NotFound(String),

    #[error("Store transaction failed: {0}")]
    Transaction(String),
}

impl SyncError {
    /// Returns true if the next cycle may succeed without operator action
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Transport(_) | SyncError::Transaction(_))
    }

    /// Get an operator-facing recovery suggestion
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            SyncError::NotConfigured => {
                "Set GOOGLE_SHEET_ID and GOOGLE_APPLICATION_CREDENTIALS (or GOOGLE_SHEETS_CREDENTIALS) to enable sync."
            }
            SyncError::Transport(_) => "The next sync cycle will retry automatically.",
            SyncError::Parse(_) => "Check the spreadsheet cell format for the reported row.",
            SyncError::NotFound(_) => "Verify the invite code exists in the guest sheet.",
            SyncError::Transaction(_) => "Check database disk space and file permissions.",
        }
    }
}

impl From<DbError> for SyncError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::GuestNotFound(code) => SyncError::NotFound(code),
            other => SyncError::Transaction(other.to_string()),
        }
    }
}

impl From<GoogleApiError> for SyncError {
    fn from(err: GoogleApiError) -> Self {
        SyncError::Transport(err.to_string())
    }
}

/// Configuration errors surfaced at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Invalid Google credentials: {0}")]
    Credentials(#[from] GoogleApiError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_from_db_error() {
        let err: SyncError = DbError::GuestNotFound("ABC123".to_string()).into();
        assert!(matches!(err, SyncError::NotFound(ref code) if code == "ABC123"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_transaction_errors_are_retryable() {
        let err: SyncError = DbError::Transaction("disk I/O error".to_string()).into();
        assert!(matches!(err, SyncError::Transaction(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_credential_errors_are_config_errors() {
        let err: ConfigError =
            GoogleApiError::InvalidCredentials("creds.json: bad key".to_string()).into();
        assert!(err.to_string().contains("creds.json"));
    }

    #[test]
    fn test_google_errors_map_to_transport() {
        let err: SyncError = GoogleApiError::AuthExpired.into();
        assert!(matches!(err, SyncError::Transport(_)));
        assert!(err.is_retryable());
    }
}
