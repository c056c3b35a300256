//! Normalization of free-form model output into the invoice schema.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::NormalizeError;
use crate::models::invoice::Invoice;

use super::location::LocationResolver;
use super::schema::Schema;

lazy_static! {
    // ```json ... ``` wrapper some models add despite a JSON mime type
    static ref CODE_FENCE: Regex = Regex::new(
        r"(?s)^```[A-Za-z]*\s*(.*?)\s*```$"
    ).unwrap();
}

/// Parse the model's response text as JSON.
pub fn parse_response_text(text: &str) -> Result<Value, NormalizeError> {
    let trimmed = text.trim();
    let body = CODE_FENCE
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map_or(trimmed, |m| m.as_str());

    serde_json::from_str(body).map_err(|source| NormalizeError::InvalidJson {
        source,
        text: text.to_string(),
    })
}

/// Conform `data` to `schema`.
///
/// Object output carries exactly the schema's properties in schema order:
/// unknown keys are dropped, missing leaves become `null`, missing objects
/// are filled recursively and missing arrays become `[]`. Values of the
/// wrong container type are replaced by the empty structure. Non-object
/// array elements are kept as they are.
pub fn ensure_all_fields_present(data: Value, schema: &Schema) -> Value {
    match schema {
        Schema::Object { properties, .. } => {
            let mut input = match data {
                Value::Object(map) => map,
                _ => Map::new(),
            };
            let mut output = Map::with_capacity(properties.len());

            for (name, prop_schema) in properties {
                let value = match input.remove(name) {
                    Some(value) => conform_present(value, prop_schema),
                    None => empty_value(prop_schema),
                };
                output.insert(name.clone(), value);
            }

            if !input.is_empty() {
                debug!(
                    "Dropping fields outside the schema: {:?}",
                    input.keys().collect::<Vec<_>>()
                );
            }

            Value::Object(output)
        }
        Schema::Array { items, .. } => match data {
            Value::Array(elements) => Value::Array(conform_elements(elements, items)),
            _ => Value::Array(Vec::new()),
        },
        Schema::String { .. } | Schema::Number { .. } => data,
    }
}

fn conform_present(value: Value, schema: &Schema) -> Value {
    match (schema, value) {
        (Schema::Object { .. }, value @ Value::Object(_)) => ensure_all_fields_present(value, schema),
        (Schema::Object { .. }, _) => empty_value(schema),
        (Schema::Array { items, .. }, Value::Array(elements)) => {
            Value::Array(conform_elements(elements, items))
        }
        (Schema::Array { .. }, _) => Value::Array(Vec::new()),
        (_, value) => value,
    }
}

fn conform_elements(elements: Vec<Value>, items: &Schema) -> Vec<Value> {
    elements
        .into_iter()
        .map(|element| {
            if element.is_object() {
                ensure_all_fields_present(element, items)
            } else {
                element
            }
        })
        .collect()
}

fn empty_value(schema: &Schema) -> Value {
    match schema {
        Schema::Object { .. } => ensure_all_fields_present(Value::Object(Map::new()), schema),
        Schema::Array { .. } => Value::Array(Vec::new()),
        Schema::String { .. } | Schema::Number { .. } => Value::Null,
    }
}

/// Turn response text into an invoice record.
///
/// Parses the text, conforms it to `schema`, builds the typed record and
/// replaces the ship-to location with the resolved branch name.
pub fn normalize(
    text: &str,
    schema: &Schema,
    resolver: &LocationResolver,
) -> Result<Invoice, NormalizeError> {
    let raw = parse_response_text(text)?;
    let value = ensure_all_fields_present(raw, schema);
    let mut invoice = Invoice::from_value(value)?;

    let location = resolver.resolve(&invoice.ship_to);
    if location != invoice.ship_to.location {
        debug!(
            "Location {:?} resolved to {:?}",
            invoice.ship_to.location, location
        );
    }
    invoice.ship_to.location = location;

    Ok(invoice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::invoice_schema;
    use crate::invoice::location::DEFAULT_LOCATIONS;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn schema() -> Schema {
        invoice_schema(&DEFAULT_LOCATIONS)
    }

    #[test]
    fn test_parse_fenced_response() {
        let value = parse_response_text("```json\n{\"invoice_number\": \"7\"}\n```").unwrap();
        assert_eq!(value, json!({"invoice_number": "7"}));

        let value = parse_response_text("  {\"a\": 1}  ").unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_parse_error_keeps_text() {
        let err = parse_response_text("not json").unwrap_err();
        match err {
            NormalizeError::InvalidJson { text, .. } => assert_eq!(text, "not json"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_input_fills_schema() {
        let value = ensure_all_fields_present(json!({}), &schema());

        assert_eq!(
            value,
            json!({
                "invoice_number": null,
                "invoice_date": null,
                "vendor": {"name": null, "address": null, "tel": null},
                "ship_to": {"name": null, "location": null, "address": null},
                "line_items": [],
                "subtotal": null,
                "tax": {"tax_rate": null, "tax_amount": null, "tax_type": null},
                "total_amount": null
            })
        );
    }

    #[test]
    fn test_non_object_input_is_empty_record() {
        let value = ensure_all_fields_present(json!(["oops"]), &schema());
        assert_eq!(value["line_items"], json!([]));
        assert_eq!(value["vendor"]["tel"], Value::Null);
    }

    #[test]
    fn test_schema_order_and_unknown_fields() {
        let value = ensure_all_fields_present(
            json!({
                "total_amount": 10,
                "ocr_verbatim": "raw text",
                "invoice_number": "A1"
            }),
            &schema(),
        );

        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys[0], "invoice_number");
        assert_eq!(keys[7], "total_amount");
        assert!(value.get("ocr_verbatim").is_none());
        assert_eq!(value["total_amount"], json!(10));
    }

    #[test]
    fn test_wrong_container_types() {
        let value = ensure_all_fields_present(
            json!({
                "vendor": "S.J. Distributors",
                "line_items": {"item_name": "rice"},
                "tax": [1, 2]
            }),
            &schema(),
        );

        assert_eq!(value["vendor"], json!({"name": null, "address": null, "tel": null}));
        assert_eq!(value["line_items"], json!([]));
        assert_eq!(value["tax"]["tax_type"], Value::Null);
    }

    #[test]
    fn test_line_items_filled_and_scalars_kept() {
        let value = ensure_all_fields_present(
            json!({"line_items": [{"item_name": "Napa", "quantity": 2}, "subtotal row"]}),
            &schema(),
        );

        assert_eq!(
            value["line_items"],
            json!([
                {
                    "item_name": "Napa",
                    "total_weight": null,
                    "unit_measure": null,
                    "quantity": 2,
                    "unit_price": null,
                    "total_price": null
                },
                "subtotal row"
            ])
        );
    }

    #[test]
    fn test_scalar_values_pass_through() {
        let value = ensure_all_fields_present(json!({"subtotal": "12.00"}), &schema());
        assert_eq!(value["subtotal"], json!("12.00"));
    }

    #[test]
    fn test_normalize_end_to_end() {
        let text = r#"{
            "invoice_number": "INV-2291",
            "invoice_date": "03/14/2025",
            "vendor": {"name": "L&T", "tel": "(213) 555-0100"},
            "ship_to": {"name": "DAN MODERN CHINESE PASADENA", "location": "Sawtelle"},
            "line_items": [
                {"item_name": "Pork Belly", "total_weight": 40.2, "unit_measure": "cs",
                 "quantity": 2, "unit_price": 3.5, "total_price": 140.7}
            ],
            "subtotal": 140.7,
            "total_amount": 140.7
        }"#;

        let invoice = normalize(text, &schema(), &LocationResolver::default()).unwrap();

        assert_eq!(invoice.invoice_number.as_deref(), Some("INV-2291"));
        assert_eq!(invoice.vendor.address, None);
        assert_eq!(invoice.ship_to.location.as_deref(), Some("PASADENA"));
        assert_eq!(invoice.line_items[0].total_price, Some(Decimal::new(1407, 1)));
        assert_eq!(invoice.tax.tax_amount, None);
    }

    #[test]
    fn test_normalize_clears_unknown_location() {
        let text = r#"{"ship_to": {"name": "Somewhere", "location": "Downtown"}}"#;
        let invoice = normalize(text, &schema(), &LocationResolver::default()).unwrap();
        assert_eq!(invoice.ship_to.location, None);
    }
}
