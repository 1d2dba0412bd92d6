//! Google Sheets API v4: values read and write.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use super::credentials::Credentials;
use super::{error_for_response, http_client, send_with_retry, GoogleApiError, RetryPolicy};

const SHEETS_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRangeUpdate<'a> {
    range: &'a str,
    major_dimension: &'static str,
    values: &'a [Vec<Value>],
}

/// Authenticated client bound to one spreadsheet.
pub struct SheetsClient {
    http: reqwest::Client,
    credentials: Credentials,
    spreadsheet_id: String,
    policy: RetryPolicy,
}

impl SheetsClient {
    pub fn new(
        spreadsheet_id: impl Into<String>,
        credentials: Credentials,
    ) -> Result<Self, GoogleApiError> {
        Ok(Self {
            http: http_client()?,
            credentials,
            spreadsheet_id: spreadsheet_id.into(),
            policy: RetryPolicy::default(),
        })
    }

    fn values_url(&self, range: &str) -> Result<Url, GoogleApiError> {
        values_url(&self.spreadsheet_id, range)
    }

    /// Read a range in row-major order. Trailing empty cells and rows are
    /// omitted by the API, so rows may be ragged.
    pub async fn get_values(&self, range: &str) -> Result<Vec<Vec<Value>>, GoogleApiError> {
        let access_token = self.credentials.access_token(&self.http).await?;
        let request = self
            .http
            .get(self.values_url(range)?)
            .bearer_auth(&access_token);

        let resp = send_with_retry(request, &self.policy).await?;
        if !resp.status().is_success() {
            return Err(error_for_response(resp).await);
        }

        let body: ValueRange = resp.json().await?;
        Ok(body.values)
    }

    /// Overwrite a range with raw (unparsed) values.
    pub async fn update_values(
        &self,
        range: &str,
        values: &[Vec<Value>],
    ) -> Result<(), GoogleApiError> {
        let access_token = self.credentials.access_token(&self.http).await?;
        let request = self
            .http
            .put(self.values_url(range)?)
            .bearer_auth(&access_token)
            .query(&[("valueInputOption", "RAW")])
            .json(&ValueRangeUpdate {
                range,
                major_dimension: "ROWS",
                values,
            });

        let resp = send_with_retry(request, &self.policy).await?;
        if !resp.status().is_success() {
            return Err(error_for_response(resp).await);
        }
        Ok(())
    }
}

/// Build `{base}/{spreadsheet_id}/values/{range}` with each part
/// percent-encoded as a single path segment.
fn values_url(spreadsheet_id: &str, range: &str) -> Result<Url, GoogleApiError> {
    let mut url = Url::parse(SHEETS_BASE)
        .map_err(|e| GoogleApiError::InvalidRange(format!("{}: {}", SHEETS_BASE, e)))?;
    url.path_segments_mut()
        .map_err(|_| GoogleApiError::InvalidRange(range.to_string()))?
        .push(spreadsheet_id)
        .push("values")
        .push(range);
    Ok(url)
}
