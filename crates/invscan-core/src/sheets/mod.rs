//! Destinations for flattened invoice rows.

mod csv_sink;
mod google;

pub use csv_sink::CsvRowSink;
pub use google::{ServiceAccountKey, SheetsClient};

use tracing::warn;

use crate::error::Result;
use crate::invoice::Row;

/// Something that accepts appended rows.
#[allow(async_fn_in_trait)]
pub trait RowSink {
    /// Append `rows` after any existing content.
    async fn append_rows(&mut self, rows: &[Row]) -> Result<()>;

    /// Whether appending does anything at all.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Fan-out over the configured sinks.
#[derive(Default)]
pub struct RowSinks {
    sheets: Option<SheetsClient>,
    csv: Option<CsvRowSink>,
}

impl RowSinks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also append to a Google Sheet.
    pub fn with_sheets(mut self, client: SheetsClient) -> Self {
        self.sheets = Some(client);
        self
    }

    /// Also append to a local CSV file.
    pub fn with_csv(mut self, sink: CsvRowSink) -> Self {
        self.csv = Some(sink);
        self
    }
}

impl RowSink for RowSinks {
    /// Every sink is attempted; the first failure is returned.
    async fn append_rows(&mut self, rows: &[Row]) -> Result<()> {
        let mut first_error = None;

        if let Some(sheets) = self.sheets.as_mut() {
            if let Err(e) = sheets.append_rows(rows).await {
                warn!("Sheet upload failed: {}", e);
                first_error.get_or_insert(e);
            }
        }

        if let Some(csv) = self.csv.as_mut() {
            if let Err(e) = csv.append_rows(rows).await {
                warn!("CSV append failed: {}", e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn is_enabled(&self) -> bool {
        self.sheets.is_some() || self.csv.is_some()
    }
}
