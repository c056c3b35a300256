//! JSON record and run summary writers.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;
use crate::models::invoice::Invoice;
use crate::pipeline::GroupOutcome;
use crate::scan::InvoiceGroup;

/// Output path for a group: `{output_dir}/{relative_dir}/{id}.json`.
pub fn invoice_json_path(output_dir: &Path, group: &InvoiceGroup) -> PathBuf {
    output_dir
        .join(&group.relative_dir)
        .join(format!("{}.json", group.id))
}

/// Write the invoice as pretty-printed JSON, creating directories as needed.
pub fn write_invoice_json(output_dir: &Path, group: &InvoiceGroup, invoice: &Invoice) -> Result<PathBuf> {
    let path = invoice_json_path(output_dir, group);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(invoice)?;
    fs::write(&path, content)?;
    debug!("Wrote {}", path.display());

    Ok(path)
}

/// Write a CSV summary of a run.
pub fn write_summary(path: &Path, outcomes: &[GroupOutcome]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "invoice_id",
        "status",
        "images",
        "invoice_number",
        "line_items",
        "rows_appended",
        "output_path",
        "processed_at",
        "processing_time_ms",
        "error",
    ])?;

    for outcome in outcomes {
        wtr.write_record([
            outcome.id.as_str(),
            outcome.status.as_str(),
            &outcome.image_count.to_string(),
            outcome.invoice_number.as_deref().unwrap_or(""),
            &outcome.line_items.to_string(),
            &outcome.rows_appended.to_string(),
            &outcome
                .output_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            &outcome.processed_at.to_rfc3339(),
            &outcome.processing_time_ms.to_string(),
            outcome.error.as_deref().unwrap_or(""),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
