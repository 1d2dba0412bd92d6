//! Native Google API client over reqwest.
//!
//! Authorized-user tokens are compatible with the JSON written by Google's
//! own client libraries (`token` or `access_token`, plus a `refresh_token`
//! and client id). Service-account keys go through `gcp_auth`.
//!
//! Modules:
//! - credentials: credential format detection and access tokens
//! - token_store: authorized-user token persistence and refresh serialization
//! - sheets: Google Sheets API v4 values endpoints

pub mod credentials;
pub mod sheets;
pub mod token_store;

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Scope required for reading the roster and writing responses.
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Per-request timeout applied by every client built here.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Token types
// ============================================================================

/// OAuth2 token payload persisted in the credentials file.
///
/// Both `token` and `access_token` are accepted on read. A freshly exported
/// authorized-user file has no access token yet; the first call refreshes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleToken {
    /// The access token
    #[serde(default, alias = "access_token")]
    pub token: String,
    /// The refresh token (long-lived, used to get new access tokens)
    pub refresh_token: Option<String>,
    /// Token endpoint URL
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    /// OAuth2 client ID
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Token expiry time (RFC 3339)
    #[serde(default)]
    pub expiry: Option<String>,
    /// Credential kind, e.g. "authorized_user"
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

// ============================================================================
// Error type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum GoogleApiError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Token expired or revoked")]
    AuthExpired,
    #[error("Token not found at {0}")]
    TokenNotFound(PathBuf),
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),
    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid credentials format: {0}")]
    InvalidCredentials(String),
    #[error("Invalid sheet range: {0}")]
    InvalidRange(String),
}

// ============================================================================
// Retry
// ============================================================================

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 250,
            max_backoff_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retryable,
    NonRetryable,
}

fn retry_decision_for_status(status: reqwest::StatusCode) -> RetryDecision {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        RetryDecision::Retryable
    } else {
        RetryDecision::NonRetryable
    }
}

fn retry_delay(
    attempt: u32,
    policy: &RetryPolicy,
    retry_after: Option<&reqwest::header::HeaderValue>,
) -> Duration {
    if let Some(value) = retry_after.and_then(|v| v.to_str().ok()) {
        if let Ok(secs) = value.parse::<u64>() {
            return Duration::from_secs(secs.min(30));
        }
    }

    let exponent = 2u64.saturating_pow(attempt.saturating_sub(1));
    let base = policy
        .initial_backoff_ms
        .saturating_mul(exponent)
        .min(policy.max_backoff_ms);
    let jitter = (std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0))
        % 150;
    Duration::from_millis(base.saturating_add(jitter))
}

/// Send a request, retrying 429/408/5xx responses and connect/timeout errors
/// with bounded exponential backoff.
pub async fn send_with_retry(
    request: reqwest::RequestBuilder,
    policy: &RetryPolicy,
) -> Result<reqwest::Response, GoogleApiError> {
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        let Some(cloned) = request.try_clone() else {
            return request.send().await.map_err(GoogleApiError::Http);
        };

        match cloned.send().await {
            Ok(response) => {
                let status = response.status();
                let decision = retry_decision_for_status(status);
                if decision == RetryDecision::Retryable && attempt < attempts {
                    let delay = retry_delay(
                        attempt,
                        policy,
                        response.headers().get(reqwest::header::RETRY_AFTER),
                    );
                    log::warn!(
                        "google_api retry {}/{} after status {} (sleep {:?})",
                        attempt,
                        attempts,
                        status,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Ok(response);
            }
            Err(err) => {
                let retryable_transport = err.is_timeout() || err.is_connect();
                if retryable_transport && attempt < attempts {
                    let delay = retry_delay(attempt, policy, None);
                    log::warn!(
                        "google_api retry {}/{} after transport error: {} (sleep {:?})",
                        attempt,
                        attempts,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Err(GoogleApiError::Http(err));
            }
        }
    }

    Err(GoogleApiError::ApiError {
        status: 0,
        message: "request exhausted retries".to_string(),
    })
}

/// Map a non-success response to an error, reading the body for context.
pub(crate) async fn error_for_response(resp: reqwest::Response) -> GoogleApiError {
    let status = resp.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return GoogleApiError::AuthExpired;
    }
    let body = resp.text().await.unwrap_or_default();
    GoogleApiError::ApiError {
        status: status.as_u16(),
        message: body,
    }
}

/// Build the shared HTTP client used for token refresh and Sheets calls.
pub fn http_client() -> Result<reqwest::Client, GoogleApiError> {
    Ok(reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

// ============================================================================
// Token refresh
// ============================================================================

/// Check if a token is expired based on its expiry field.
pub fn is_token_expired(token: &GoogleToken) -> bool {
    if token.token.is_empty() {
        return true;
    }
    match &token.expiry {
        None => true, // No expiry = assume expired, try refresh
        Some(expiry_str) => {
            match chrono::DateTime::parse_from_rfc3339(&expiry_str.replace('Z', "+00:00"))
                .or_else(|_| chrono::DateTime::parse_from_rfc3339(expiry_str))
            {
                Ok(expiry) => {
                    // Consider expired if within 60 seconds of expiry
                    let now = chrono::Utc::now();
                    expiry <= now + chrono::Duration::seconds(60)
                }
                Err(_) => true,
            }
        }
    }
}

/// Exchange the refresh token for a new access token.
///
/// Returns the updated token; persisting it is the caller's job.
pub(crate) async fn refresh_access_token(
    client: &reqwest::Client,
    token: &GoogleToken,
) -> Result<GoogleToken, GoogleApiError> {
    let refresh_token = token
        .refresh_token
        .as_deref()
        .ok_or(GoogleApiError::AuthExpired)?;

    let mut form = vec![
        ("client_id", token.client_id.as_str()),
        ("refresh_token", refresh_token),
        ("grant_type", "refresh_token"),
    ];
    if let Some(secret) = token.client_secret.as_deref() {
        form.push(("client_secret", secret));
    }

    let resp = send_with_retry(
        client.post(&token.token_uri).form(&form),
        &RetryPolicy::default(),
    )
    .await?;
    let status = resp.status();
    let body_text = resp.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(map_refresh_error(status.as_u16(), &body_text));
    }
    apply_refresh_response(token, &body_text)
}

fn apply_refresh_response(token: &GoogleToken, body_text: &str) -> Result<GoogleToken, GoogleApiError> {
    let body: serde_json::Value = serde_json::from_str(body_text)?;
    let access_token = body["access_token"]
        .as_str()
        .ok_or_else(|| GoogleApiError::RefreshFailed("No access_token in response".into()))?;

    let expires_in = body["expires_in"].as_u64().unwrap_or(3600);
    let expiry = chrono::Utc::now() + chrono::Duration::seconds(expires_in as i64);

    let mut new_token = token.clone();
    new_token.token = access_token.to_string();
    new_token.expiry = Some(expiry.to_rfc3339());
    Ok(new_token)
}

fn map_refresh_error(status: u16, body: &str) -> GoogleApiError {
    let lowered = body.to_lowercase();
    if (status == 400 || status == 401)
        && (lowered.contains("invalid_grant") || lowered.contains("token has been expired"))
    {
        return GoogleApiError::AuthExpired;
    }
    GoogleApiError::RefreshFailed(format!("HTTP {}: {}", status, body))
}

// ============================================================================
// Tests
// ============================================================================
