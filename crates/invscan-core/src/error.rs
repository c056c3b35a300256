//! Error types for the invscan-core library.

use thiserror::Error;

/// Main error type for the invscan library.
#[derive(Error, Debug)]
pub enum InvscanError {
    /// Vision model call failed.
    #[error("vision error: {0}")]
    Vision(#[from] VisionError),

    /// Spreadsheet upload failed.
    #[error("sheets error: {0}")]
    Sheets(#[from] SheetsError),

    /// Model output could not be turned into an invoice.
    #[error("normalization error: {0}")]
    Normalize(#[from] NormalizeError),

    /// Invoice discovery failed.
    #[error("scan error: {0}")]
    Scan(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV output error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised while talking to the vision model.
#[derive(Error, Debug)]
pub enum VisionError {
    /// No API key was configured.
    #[error("missing API key (set GEMINI_API_KEY)")]
    MissingApiKey,

    /// None of the invoice images could be read.
    #[error("no readable images for invoice {0}")]
    NoImages(String),

    /// Transport-level failure.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The prompt was rejected by the service's safety filters.
    #[error("request blocked: {0}")]
    Blocked(String),

    /// The service returned no text.
    #[error("empty response")]
    EmptyResponse,
}

/// Errors raised while appending rows to Google Sheets.
#[derive(Error, Debug)]
pub enum SheetsError {
    /// The service account file is missing or malformed.
    #[error("invalid service account credentials: {0}")]
    Credentials(String),

    /// JWT signing failed.
    #[error("failed to sign token request: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// The token endpoint rejected the grant.
    #[error("token exchange failed: {0}")]
    Token(String),

    /// The spreadsheet URL could not be built.
    #[error("invalid URL: {0}")]
    Url(String),

    /// Transport-level failure.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Errors raised while normalizing model output.
#[derive(Error, Debug)]
pub enum NormalizeError {
    /// The response text is not JSON.
    #[error("response is not valid JSON: {source}")]
    InvalidJson {
        source: serde_json::Error,
        /// The offending response text.
        text: String,
    },

    /// The normalized value does not fit the invoice record.
    #[error("unexpected invoice shape: {0}")]
    Shape(serde_json::Error),
}

/// Result type for the invscan library.
pub type Result<T> = std::result::Result<T, InvscanError>;
