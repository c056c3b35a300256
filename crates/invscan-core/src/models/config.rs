//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::invoice::location::DEFAULT_LOCATIONS;
use crate::scan::DEFAULT_IMAGE_PATTERNS;

/// Main configuration for invscan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Vision model configuration.
    pub gemini: GeminiConfig,

    /// Spreadsheet output configuration.
    pub sheets: SheetsConfig,

    /// Input and output directories.
    pub paths: PathsConfig,

    /// Invoice discovery configuration.
    pub scan: ScanConfig,

    /// Known restaurant branches matched against ship-to text.
    pub locations: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gemini: GeminiConfig::default(),
            sheets: SheetsConfig::default(),
            paths: PathsConfig::default(),
            scan: ScanConfig::default(),
            locations: DEFAULT_LOCATIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Gemini generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// API key. Usually supplied through `GEMINI_API_KEY` rather than the file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Service root.
    pub base_url: String,

    /// Model name.
    pub model: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Nucleus sampling threshold.
    pub top_p: f32,

    /// Top-k sampling cutoff.
    pub top_k: u32,

    /// Upper bound on generated tokens.
    pub max_output_tokens: u32,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Attempts for throttled or failed requests.
    pub max_retries: usize,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.0-flash".to_string(),
            temperature: 0.2,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 8192,
            timeout_secs: 120,
            max_retries: 3,
        }
    }
}

/// Google Sheets output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetsConfig {
    /// Spreadsheet key from the sheet URL.
    pub spreadsheet_id: Option<String>,

    /// Worksheet (tab) receiving the rows.
    pub sheet_name: String,

    /// Service account credentials JSON.
    pub service_account_file: Option<PathBuf>,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: None,
            sheet_name: "Invoice data".to_string(),
            service_account_file: None,
        }
    }
}

impl SheetsConfig {
    /// Spreadsheet id and credentials path, when both are configured.
    pub fn credentials(&self) -> Option<(&str, &Path)> {
        match (&self.spreadsheet_id, &self.service_account_file) {
            (Some(id), Some(file)) if !id.trim().is_empty() => Some((id.as_str(), file.as_path())),
            _ => None,
        }
    }
}

/// Input and output directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding the invoice folders.
    pub base_dir: PathBuf,

    /// Directory receiving the parsed JSON files.
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("invoices"),
            output_dir: PathBuf::from("parsed_invoices"),
        }
    }
}

/// How images are grouped into invoices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Each sub-folder holds the pages of one invoice.
    #[default]
    Folders,
    /// Each image is a single-page invoice.
    Files,
}

/// Invoice discovery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Grouping mode.
    pub mode: ScanMode,

    /// Case-insensitive file name patterns treated as invoice pages.
    pub patterns: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            mode: ScanMode::Folders,
            patterns: DEFAULT_IMAGE_PATTERNS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Empty values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("GEMINI_API_KEY") {
            self.gemini.api_key = Some(key);
        }
        if let Some(id) = get("GOOGLE_SHEETS_ID") {
            self.sheets.spreadsheet_id = Some(id);
        }
        if let Some(file) = get("SERVICE_ACCOUNT_FILE") {
            self.sheets.service_account_file = Some(PathBuf::from(file));
        }
        if let Some(name) = get("INVOICE_SHEET_NAME") {
            self.sheets.sheet_name = name;
        }
        if let Some(dir) = get("INVOICE_BASE_DIR") {
            self.paths.base_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get("INVOICE_OUTPUT_DIR") {
            self.paths.output_dir = PathBuf::from(dir);
        }
    }

    /// Copy suitable for display, with secrets masked.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if let Some(key) = &config.gemini.api_key {
            let tail: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
            config.gemini.api_key = Some(format!("****{}", tail));
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("GEMINI_API_KEY", "secret-key-1234"),
            ("GOOGLE_SHEETS_ID", "sheet-id"),
            ("SERVICE_ACCOUNT_FILE", "/etc/sa.json"),
            ("INVOICE_BASE_DIR", "/data/in"),
            ("INVOICE_OUTPUT_DIR", ""),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env_from(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.gemini.api_key.as_deref(), Some("secret-key-1234"));
        assert_eq!(config.paths.base_dir, PathBuf::from("/data/in"));
        assert_eq!(config.paths.output_dir, PathBuf::from("parsed_invoices"));
        assert_eq!(
            config.sheets.credentials(),
            Some(("sheet-id", Path::new("/etc/sa.json")))
        );
    }

    #[test]
    fn test_sheets_need_both_settings() {
        let mut config = AppConfig::default();
        config.sheets.spreadsheet_id = Some("abc".to_string());
        assert!(config.sheets.credentials().is_none());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"gemini": {"model": "gemini-2.5-flash"}}"#).unwrap();

        assert_eq!(config.gemini.model, "gemini-2.5-flash");
        assert_eq!(config.gemini.top_k, 40);
        assert_eq!(config.sheets.sheet_name, "Invoice data");
        assert_eq!(config.scan.mode, ScanMode::Folders);
        assert_eq!(config.locations.len(), 7);
    }

    #[test]
    fn test_redacted_hides_key() {
        let mut config = AppConfig::default();
        config.gemini.api_key = Some("abcdefgh".to_string());

        assert_eq!(config.redacted().gemini.api_key.as_deref(), Some("****efgh"));
    }

    #[test]
    fn test_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = AppConfig::default();
        config.scan.mode = ScanMode::Files;
        config.save(&path).unwrap();

        let loaded = AppConfig::from_file(&path).unwrap();
        assert_eq!(loaded.scan.mode, ScanMode::Files);
    }
}
