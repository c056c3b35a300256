//! Local CSV mirror of the spreadsheet rows.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;
use crate::invoice::rows::{ROW_HEADER, Row, cell_text};

use super::RowSink;

/// Appends rows to a CSV file, writing the header when the file is new.
#[derive(Debug, Clone)]
pub struct CsvRowSink {
    path: PathBuf,
}

impl CsvRowSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RowSink for CsvRowSink {
    async fn append_rows(&mut self, rows: &[Row]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let needs_header = file.metadata()?.len() == 0;

        let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(file);
        if needs_header {
            wtr.write_record(ROW_HEADER)?;
        }
        for row in rows {
            wtr.write_record(row.iter().map(cell_text))?;
        }
        wtr.flush()?;

        debug!("Appended {} row(s) to {}", rows.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/rows.csv");
        let mut sink = CsvRowSink::new(&path);

        sink.append_rows(&[vec![json!("INV-1"), json!(""), json!(2.5)]]).await.unwrap();
        sink.append_rows(&[vec![json!("INV-2"), json!("x"), json!(3)]]).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("invoice_number,invoice_date,vendor_name"));
        assert_eq!(lines[1], "INV-1,,2.5");
        assert_eq!(lines[2], "INV-2,x,3");
    }
}
