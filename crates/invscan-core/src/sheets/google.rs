//! Google Sheets `values.append` client with service-account auth.

use std::path::Path;
use std::time::{Duration, Instant};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, SheetsError};
use crate::invoice::Row;
use crate::models::config::SheetsConfig;

use super::RowSink;

const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;
// refresh this long before the token actually expires
const TOKEN_MARGIN: Duration = Duration::from_secs(60);

/// The parts of a service account key file needed for the JWT grant.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    /// Load a key file downloaded from the Google Cloud console.
    pub fn from_file(path: &Path) -> std::result::Result<Self, SheetsError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SheetsError::Credentials(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> std::result::Result<Self, SheetsError> {
        serde_json::from_str(content).map_err(|e| SheetsError::Credentials(e.to_string()))
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    TOKEN_LIFETIME_SECS as u64
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

#[derive(Debug, Serialize)]
struct AppendRequest<'a> {
    values: &'a [Row],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendResponse {
    updates: Option<AppendUpdates>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    updated_range: Option<String>,
    updated_rows: Option<u64>,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Appends rows to one worksheet of a spreadsheet.
pub struct SheetsClient {
    client: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    sheet_name: String,
    key: ServiceAccountKey,
    token: Option<CachedToken>,
}

impl SheetsClient {
    pub fn new(
        spreadsheet_id: impl Into<String>,
        sheet_name: impl Into<String>,
        key: ServiceAccountKey,
    ) -> std::result::Result<Self, SheetsError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("invscan/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            base_url: "https://sheets.googleapis.com".to_string(),
            spreadsheet_id: spreadsheet_id.into(),
            sheet_name: sheet_name.into(),
            key,
            token: None,
        })
    }

    /// Client for the configured spreadsheet, or `None` when the spreadsheet
    /// id or the credentials file is not set.
    pub fn from_config(config: &SheetsConfig) -> std::result::Result<Option<Self>, SheetsError> {
        let Some((spreadsheet_id, key_file)) = config.credentials() else {
            return Ok(None);
        };
        let key = ServiceAccountKey::from_file(key_file)?;
        Self::new(spreadsheet_id, config.sheet_name.clone(), key).map(Some)
    }

    /// Point the client at another API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    /// A1 range anchoring the append at the top of the sheet.
    fn range(&self) -> String {
        format!("'{}'!A1", self.sheet_name.replace('\'', "''"))
    }

    fn append_url(&self) -> std::result::Result<Url, SheetsError> {
        let range_segment = format!("{}:append", self.range());
        let mut url = Url::parse(&self.base_url).map_err(|e| SheetsError::Url(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| SheetsError::Url(format!("cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend([
                "v4",
                "spreadsheets",
                self.spreadsheet_id.as_str(),
                "values",
                range_segment.as_str(),
            ]);
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED")
            .append_pair("insertDataOption", "INSERT_ROWS");
        Ok(url)
    }

    fn signed_assertion(&self, issued_at: i64) -> std::result::Result<String, SheetsError> {
        let claims = Claims {
            iss: &self.key.client_email,
            scope: SHEETS_SCOPE,
            aud: &self.key.token_uri,
            iat: issued_at,
            exp: issued_at + TOKEN_LIFETIME_SECS,
        };
        let key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())?;
        Ok(jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)?)
    }

    async fn access_token(&mut self) -> std::result::Result<String, SheetsError> {
        if let Some(token) = &self.token {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let assertion = self.signed_assertion(chrono::Utc::now().timestamp())?;
        let resp = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => match err.error_description {
                    Some(description) => format!("{} ({})", err.error, description),
                    None => err.error,
                },
                Err(_) => format!("{}: {}", status, body),
            };
            return Err(SheetsError::Token(message));
        }

        let token: TokenResponse = resp.json().await?;
        let lifetime = Duration::from_secs(token.expires_in);
        debug!("Obtained Sheets access token valid for {:?}", lifetime);

        self.token = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime.saturating_sub(TOKEN_MARGIN),
        });
        Ok(token.access_token)
    }

    /// Append rows below the existing data of the sheet.
    pub async fn append(&mut self, rows: &[Row]) -> std::result::Result<(), SheetsError> {
        if rows.is_empty() {
            return Ok(());
        }

        let token = self.access_token().await?;
        let url = self.append_url()?;
        let resp = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&AppendRequest { values: rows })
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(SheetsError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: AppendResponse = resp.json().await?;
        if let Some(updates) = parsed.updates {
            info!(
                "Appended {} row(s) to {}",
                updates.updated_rows.unwrap_or(rows.len() as u64),
                updates.updated_range.as_deref().unwrap_or(&self.sheet_name)
            );
        }
        Ok(())
    }
}

impl RowSink for SheetsClient {
    async fn append_rows(&mut self, rows: &[Row]) -> Result<()> {
        Ok(self.append(rows).await?)
    }
}
