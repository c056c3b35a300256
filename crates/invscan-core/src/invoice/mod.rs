//! Invoice schema, response normalization and tabular flattening.

pub mod location;
pub mod normalizer;
pub mod rows;
mod schema;

pub use location::LocationResolver;
pub use normalizer::{ensure_all_fields_present, normalize, parse_response_text};
pub use rows::{ROW_HEADER, Row, to_rows};
pub use schema::{Schema, invoice_schema};
