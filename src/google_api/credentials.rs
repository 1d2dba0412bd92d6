//! Google credential loading for the Sheets client.
//!
//! The JSON `type` field selects the flow:
//! - `service_account`: a key file; `gcp_auth` signs the JWT exchange and
//!   caches access tokens
//! - `authorized_user` (or no type): an OAuth refresh token kept in a
//!   `TokenStore`
//!
//! Credentials are parsed once at startup so a bad file fails there instead
//! of inside every sync cycle.

use std::path::Path;

use gcp_auth::{CustomServiceAccount, TokenProvider};
use serde::Deserialize;

use super::token_store::TokenStore;
use super::{GoogleApiError, GoogleToken, SHEETS_SCOPE};

const SERVICE_ACCOUNT: &str = "service_account";
const AUTHORIZED_USER: &str = "authorized_user";

#[derive(Debug, Deserialize)]
struct CredentialHeader {
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

/// Parsed credentials, ready to mint access tokens.
pub enum Credentials {
    ServiceAccount(CustomServiceAccount),
    AuthorizedUser(TokenStore),
}

// Redacted: never print key material or tokens.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Credentials").field(&self.kind()).finish()
    }
}

impl Credentials {
    /// Load a credentials file (`GOOGLE_APPLICATION_CREDENTIALS`).
    ///
    /// Authorized-user files stay file-backed so refreshed tokens persist.
    pub fn from_file(path: &Path) -> Result<Self, GoogleApiError> {
        if !path.exists() {
            return Err(GoogleApiError::TokenNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let origin = path.display().to_string();

        if is_service_account(&content, &origin)? {
            return service_account(&content, &origin);
        }
        let store = TokenStore::new(path);
        store.load()?;
        Ok(Self::AuthorizedUser(store))
    }

    /// Load inline credentials JSON (`GOOGLE_SHEETS_CREDENTIALS`).
    pub fn from_json(json: &str) -> Result<Self, GoogleApiError> {
        let origin = "inline credentials";
        if is_service_account(json, origin)? {
            return service_account(json, origin);
        }
        let token: GoogleToken = serde_json::from_str(json)
            .map_err(|e| GoogleApiError::InvalidCredentials(format!("{}: {}", origin, e)))?;
        Ok(Self::AuthorizedUser(TokenStore::in_memory(token)))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ServiceAccount(_) => SERVICE_ACCOUNT,
            Self::AuthorizedUser(_) => AUTHORIZED_USER,
        }
    }

    /// A bearer token valid for the Sheets scope.
    pub async fn access_token(&self, client: &reqwest::Client) -> Result<String, GoogleApiError> {
        match self {
            Self::ServiceAccount(account) => {
                let token = account
                    .token(&[SHEETS_SCOPE])
                    .await
                    .map_err(|e| GoogleApiError::RefreshFailed(e.to_string()))?;
                Ok(token.as_str().to_string())
            }
            Self::AuthorizedUser(store) => store.access_token(client).await,
        }
    }
}

/// Read the `type` field; anything but the two supported kinds is rejected.
fn is_service_account(json: &str, origin: &str) -> Result<bool, GoogleApiError> {
    let header: CredentialHeader = serde_json::from_str(json)
        .map_err(|e| GoogleApiError::InvalidCredentials(format!("{}: {}", origin, e)))?;
    match header.kind.as_deref() {
        Some(SERVICE_ACCOUNT) => Ok(true),
        None | Some(AUTHORIZED_USER) => Ok(false),
        Some(other) => Err(GoogleApiError::InvalidCredentials(format!(
            "{}: unsupported credential type '{}'",
            origin, other
        ))),
    }
}

fn service_account(json: &str, origin: &str) -> Result<Credentials, GoogleApiError> {
    let account = CustomServiceAccount::from_json(json)
        .map_err(|e| GoogleApiError::InvalidCredentials(format!("{}: {}", origin, e)))?;
    Ok(Credentials::ServiceAccount(account))
}
