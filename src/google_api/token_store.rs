//! OAuth token storage for authorized-user credentials.
//!
//! - File backend: the credentials file itself. Refreshed access tokens are
//!   written back atomically so a restart does not have to refresh again.
//! - Memory backend: credentials passed inline (environment); refreshed
//!   tokens live for the lifetime of the process.

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use super::{is_token_expired, refresh_access_token, GoogleApiError, GoogleToken};

enum TokenBackend {
    File(PathBuf),
    Memory(parking_lot::Mutex<GoogleToken>),
}

/// Owns the token and serializes concurrent refreshes.
pub struct TokenStore {
    backend: TokenBackend,
    refresh_lock: Mutex<()>,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_backend(TokenBackend::File(path.into()))
    }

    pub fn in_memory(token: GoogleToken) -> Self {
        Self::with_backend(TokenBackend::Memory(parking_lot::Mutex::new(token)))
    }

    fn with_backend(backend: TokenBackend) -> Self {
        Self {
            backend,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Load the current token.
    pub fn load(&self) -> Result<GoogleToken, GoogleApiError> {
        match &self.backend {
            TokenBackend::File(path) => load_token_file(path),
            TokenBackend::Memory(token) => Ok(token.lock().clone()),
        }
    }

    /// Persist a token.
    pub fn save(&self, token: &GoogleToken) -> Result<(), GoogleApiError> {
        match &self.backend {
            TokenBackend::File(path) => save_token_file(path, token),
            TokenBackend::Memory(slot) => {
                *slot.lock() = token.clone();
                Ok(())
            }
        }
    }

    fn describe(&self) -> String {
        match &self.backend {
            TokenBackend::File(path) => path.display().to_string(),
            TokenBackend::Memory(_) => "inline credentials".to_string(),
        }
    }

    /// Get a valid access token, refreshing and persisting if expired.
    ///
    /// The refresh lock is held across the exchange so concurrent callers
    /// reuse one refreshed token instead of racing the token endpoint.
    pub async fn access_token(&self, client: &reqwest::Client) -> Result<String, GoogleApiError> {
        let _guard = self.refresh_lock.lock().await;

        let token = self.load()?;
        if !is_token_expired(&token) {
            return Ok(token.token);
        }

        log::debug!("Refreshing Google access token from {}", self.describe());
        let refreshed = refresh_access_token(client, &token).await?;
        if let Err(e) = self.save(&refreshed) {
            // The fresh token is still usable for this process
            log::warn!("Failed to persist refreshed token: {}", e);
        }
        Ok(refreshed.token)
    }
}

fn load_token_file(path: &Path) -> Result<GoogleToken, GoogleApiError> {
    if !path.exists() {
        return Err(GoogleApiError::TokenNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| GoogleApiError::InvalidCredentials(format!("{}: {}", path.display(), e)))
}

/// Replace the token file atomically (write a sibling, then rename).
fn save_token_file(path: &Path, token: &GoogleToken) -> Result<(), GoogleApiError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let content = serde_json::to_string_pretty(token)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
    }

    std::fs::rename(&tmp, path)?;
    Ok(())
}
