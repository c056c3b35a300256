//! Core library for AI-assisted invoice extraction.
//!
//! This crate provides:
//! - The fixed invoice schema and the normalizer that coerces free-form
//!   vision model output into it
//! - Location resolution against a list of known restaurant branches
//! - Invoice folder discovery
//! - A Gemini vision client and a Google Sheets row writer
//! - The batch pipeline tying those together

pub mod error;
pub mod models;
pub mod invoice;
pub mod scan;
pub mod vision;
pub mod sheets;
pub mod output;
pub mod pipeline;

pub use error::{InvscanError, Result};
pub use models::config::AppConfig;
pub use models::invoice::{Invoice, LineItem, ShipTo, Tax, Vendor};
pub use invoice::{LocationResolver, Schema, invoice_schema, normalize};
pub use scan::{ImageFilter, InvoiceGroup};
pub use vision::{GeminiClient, VisionModel, VisionRequest};
pub use sheets::{CsvRowSink, RowSink, RowSinks, SheetsClient};
pub use pipeline::{GroupOutcome, GroupStatus, InvoicePipeline, PipelineOptions, RunReport};
