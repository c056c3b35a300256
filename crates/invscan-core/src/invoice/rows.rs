//! Flattening of invoices into spreadsheet rows.

use rust_decimal::Decimal;
use serde_json::Value;

use crate::models::invoice::{Invoice, decimal_to_value};

/// One spreadsheet row; cells are strings or numbers.
pub type Row = Vec<Value>;

/// Column names, in cell order.
pub const ROW_HEADER: [&str; 11] = [
    "invoice_number",
    "invoice_date",
    "vendor_name",
    "ship_to_name",
    "location",
    "item_name",
    "quantity",
    "total_weight",
    "unit_measure",
    "unit_price",
    "total_price",
];

/// One row per line item; an invoice without line items yields no rows.
pub fn to_rows(invoice: &Invoice) -> Vec<Row> {
    invoice
        .line_items
        .iter()
        .map(|item| {
            vec![
                text_cell(&invoice.invoice_number),
                text_cell(&invoice.invoice_date),
                text_cell(&invoice.vendor.name),
                text_cell(&invoice.ship_to.name),
                text_cell(&invoice.ship_to.location),
                text_cell(&item.item_name),
                number_cell(&item.quantity),
                number_cell(&item.total_weight),
                text_cell(&item.unit_measure),
                number_cell(&item.unit_price),
                number_cell(&item.total_price),
            ]
        })
        .collect()
}

/// Render a cell as plain text for CSV output.
pub fn cell_text(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn text_cell(value: &Option<String>) -> Value {
    Value::String(value.clone().unwrap_or_default())
}

fn number_cell(value: &Option<Decimal>) -> Value {
    value
        .as_ref()
        .map(decimal_to_value)
        .unwrap_or_else(|| Value::String(String::new()))
}
