//! Batch orchestration: one vision call per invoice, then JSON and rows.

use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::error::{NormalizeError, Result};
use crate::invoice::{LocationResolver, Schema, invoice_schema, normalize, to_rows};
use crate::models::invoice::Invoice;
use crate::output::write_invoice_json;
use crate::scan::InvoiceGroup;
use crate::sheets::RowSink;
use crate::vision::{INVOICE_PROMPT, VisionModel, build_request};

/// Pipeline settings.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Root for the JSON records.
    pub output_dir: PathBuf,
    /// Abort on the first failed invoice instead of skipping it.
    pub fail_fast: bool,
}

/// How one invoice fared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupStatus {
    /// JSON written and rows appended (or no sink configured).
    Success,
    /// JSON written but the rows could not be appended.
    Partial,
    /// Nothing written.
    Failed,
}

impl GroupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupStatus::Success => "success",
            GroupStatus::Partial => "partial",
            GroupStatus::Failed => "failed",
        }
    }
}

/// Result of processing one invoice group.
#[derive(Debug, Clone)]
pub struct GroupOutcome {
    pub id: String,
    pub image_count: usize,
    pub status: GroupStatus,
    pub invoice_number: Option<String>,
    pub line_items: usize,
    pub rows_appended: usize,
    pub output_path: Option<PathBuf>,
    pub processed_at: DateTime<Utc>,
    pub processing_time_ms: u64,
    pub error: Option<String>,
}

impl GroupOutcome {
    fn new(group: &InvoiceGroup) -> Self {
        Self {
            id: group.id.clone(),
            image_count: group.images.len(),
            status: GroupStatus::Failed,
            invoice_number: None,
            line_items: 0,
            rows_appended: 0,
            output_path: None,
            processed_at: Utc::now(),
            processing_time_ms: 0,
            error: None,
        }
    }
}

/// Summary of a batch run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub outcomes: Vec<GroupOutcome>,
    pub elapsed_ms: u64,
    /// Id of the invoice a fail-fast run stopped at.
    pub aborted_at: Option<String>,
}

impl RunReport {
    fn count(&self, status: GroupStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(GroupStatus::Success)
    }

    pub fn partial(&self) -> usize {
        self.count(GroupStatus::Partial)
    }

    pub fn failed(&self) -> usize {
        self.count(GroupStatus::Failed)
    }

    pub fn rows_appended(&self) -> usize {
        self.outcomes.iter().map(|o| o.rows_appended).sum()
    }
}

/// Drives invoices through the vision model, the normalizer and the writers.
pub struct InvoicePipeline<V> {
    model: V,
    schema: Schema,
    resolver: LocationResolver,
    prompt: String,
    options: PipelineOptions,
}

impl<V: VisionModel> InvoicePipeline<V> {
    pub fn new(model: V, resolver: LocationResolver, options: PipelineOptions) -> Self {
        let schema = invoice_schema(resolver.locations());
        Self {
            model,
            schema,
            resolver,
            prompt: INVOICE_PROMPT.to_string(),
            options,
        }
    }

    /// Replace the instruction text sent with the images.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Send one invoice to the model and normalize the answer.
    pub async fn process_group(&self, group: &InvoiceGroup) -> Result<Invoice> {
        info!("Processing invoice {} with {} image(s)", group.id, group.images.len());

        let request = build_request(&group.id, &group.images, &self.prompt, &self.schema)?;
        let text = self.model.generate(&request).await?;

        let invoice = normalize(&text, &self.schema, &self.resolver).inspect_err(|e| {
            if let NormalizeError::InvalidJson { text, .. } = e {
                warn!("Unparseable response for {}: {}", group.id, text);
            }
        })?;

        for issue in invoice.validate() {
            warn!("Invoice {}: {}", group.id, issue);
        }

        Ok(invoice)
    }

    /// Process every group in order, skipping failures.
    ///
    /// With `fail_fast` the run stops after the first failed group and the
    /// report records where; outcomes gathered so far are kept.
    pub async fn run<S: RowSink>(&self, groups: &[InvoiceGroup], sink: &mut S) -> Result<RunReport> {
        self.run_with_progress(groups, sink, |_| {}).await
    }

    /// Like [`run`](Self::run), calling `progress` after each group.
    pub async fn run_with_progress<S, F>(
        &self,
        groups: &[InvoiceGroup],
        sink: &mut S,
        mut progress: F,
    ) -> Result<RunReport>
    where
        S: RowSink,
        F: FnMut(&GroupOutcome),
    {
        let start = Instant::now();
        let mut report = RunReport::default();

        if groups.is_empty() {
            warn!("No invoices to process");
            return Ok(report);
        }

        if !sink.is_enabled() {
            info!("No row destination configured; only JSON files will be written");
        }

        for group in groups {
            let outcome = self.run_group(group, sink).await;
            let abort = outcome.status == GroupStatus::Failed && self.options.fail_fast;

            progress(&outcome);
            report.outcomes.push(outcome);

            if abort {
                warn!("Stopping at failed invoice {}", group.id);
                report.aborted_at = Some(group.id.clone());
                break;
            }
        }

        report.elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            "Processed {} invoice(s): {} succeeded, {} partial, {} failed",
            report.outcomes.len(),
            report.succeeded(),
            report.partial(),
            report.failed()
        );

        Ok(report)
    }

    async fn run_group<S: RowSink>(&self, group: &InvoiceGroup, sink: &mut S) -> GroupOutcome {
        let start = Instant::now();
        let mut outcome = GroupOutcome::new(group);

        let result = self.process_group(group).await.and_then(|invoice| {
            let path = write_invoice_json(&self.options.output_dir, group, &invoice)?;
            info!("Saved parsed invoice to {}", path.display());
            Ok((invoice, path))
        });

        match result {
            Ok((invoice, path)) => {
                outcome.invoice_number = invoice.invoice_number.clone();
                outcome.line_items = invoice.line_items.len();
                outcome.output_path = Some(path);
                outcome.status = GroupStatus::Success;

                let rows = to_rows(&invoice);
                if rows.is_empty() {
                    info!("No tabular data generated for invoice {}", group.id);
                } else if sink.is_enabled() {
                    match sink.append_rows(&rows).await {
                        Ok(()) => {
                            debug!("Appended {} row(s) for invoice {}", rows.len(), group.id);
                            outcome.rows_appended = rows.len();
                        }
                        Err(e) => {
                            error!("Failed to append rows for invoice {}: {}", group.id, e);
                            outcome.status = GroupStatus::Partial;
                            outcome.error = Some(e.to_string());
                        }
                    }
                }
            }
            Err(e) => {
                error!("Failed to parse invoice {}: {}", group.id, e);
                outcome.error = Some(e.to_string());
            }
        }

        outcome.processing_time_ms = start.elapsed().as_millis() as u64;
        outcome
    }
}
