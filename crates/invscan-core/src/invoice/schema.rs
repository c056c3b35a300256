//! The fixed invoice schema.
//!
//! The same tree drives both the structured-output request sent to the
//! vision model and the local normalization of whatever comes back.

use serde_json::{Map, Value, json};

/// A node of the output schema.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    /// Object with properties in output order.
    Object {
        properties: Vec<(String, Schema)>,
        description: Option<String>,
    },
    /// Homogeneous list.
    Array {
        items: Box<Schema>,
        description: Option<String>,
    },
    /// Text leaf.
    String { description: Option<String> },
    /// Numeric leaf.
    Number { description: Option<String> },
}

impl Schema {
    pub fn string(description: &str) -> Self {
        Schema::String {
            description: Some(description.to_string()),
        }
    }

    pub fn number(description: &str) -> Self {
        Schema::Number {
            description: Some(description.to_string()),
        }
    }

    pub fn object<I>(properties: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, Schema)>,
    {
        Schema::Object {
            properties: properties
                .into_iter()
                .map(|(name, schema)| (name.to_string(), schema))
                .collect(),
            description: None,
        }
    }

    pub fn array(items: Schema) -> Self {
        Schema::Array {
            items: Box::new(items),
            description: None,
        }
    }

    /// Look up a direct property of an object schema.
    pub fn property(&self, name: &str) -> Option<&Schema> {
        match self {
            Schema::Object { properties, .. } => properties
                .iter()
                .find(|(prop, _)| prop == name)
                .map(|(_, schema)| schema),
            _ => None,
        }
    }

    fn description(&self) -> Option<&str> {
        match self {
            Schema::Object { description, .. }
            | Schema::Array { description, .. }
            | Schema::String { description }
            | Schema::Number { description } => description.as_deref(),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Schema::Object { .. } => "OBJECT",
            Schema::Array { .. } => "ARRAY",
            Schema::String { .. } => "STRING",
            Schema::Number { .. } => "NUMBER",
        }
    }

    /// Render the OpenAPI-subset form accepted as a Gemini `responseSchema`.
    pub fn to_gemini(&self) -> Value {
        let mut node = Map::new();
        node.insert("type".to_string(), json!(self.type_name()));
        if let Some(description) = self.description() {
            node.insert("description".to_string(), json!(description));
        }

        match self {
            Schema::Object { properties, .. } => {
                let rendered: Map<String, Value> = properties
                    .iter()
                    .map(|(name, schema)| (name.clone(), schema.to_gemini()))
                    .collect();
                let ordering: Vec<&str> = properties.iter().map(|(name, _)| name.as_str()).collect();
                node.insert("properties".to_string(), Value::Object(rendered));
                node.insert("propertyOrdering".to_string(), json!(ordering));
            }
            Schema::Array { items, .. } => {
                node.insert("items".to_string(), items.to_gemini());
            }
            Schema::String { .. } | Schema::Number { .. } => {}
        }

        Value::Object(node)
    }
}

/// Build the invoice schema, listing `locations` in the location hint.
pub fn invoice_schema<S: AsRef<str>>(locations: &[S]) -> Schema {
    let location_hint = format!(
        "Extracted location name from the ship_to name (either {})",
        locations.iter().map(|l| l.as_ref()).collect::<Vec<_>>().join(", ")
    );

    Schema::object([
        ("invoice_number", Schema::string("The unique identifier for the invoice")),
        ("invoice_date", Schema::string("The date the invoice was issued")),
        (
            "vendor",
            Schema::object([
                (
                    "name",
                    Schema::string("Vendor company name (either S.J. Distributors or L&T or A Farm)"),
                ),
                ("address", Schema::string("Vendor address")),
                ("tel", Schema::string("Vendor contact phone number")),
            ]),
        ),
        (
            "ship_to",
            Schema::object([
                ("name", Schema::string("Restaurant name (e.g. DAN MODERN CHINESE #4)")),
                ("location", Schema::String { description: Some(location_hint) }),
                ("address", Schema::string("Restaurant address")),
            ]),
        ),
        (
            "line_items",
            Schema::array(Schema::object([
                ("item_name", Schema::string("Name of the item")),
                ("total_weight", Schema::number("Total Weight")),
                ("unit_measure", Schema::string("Unit of measurement (e.g., cs, bg, pk, etc.)")),
                ("quantity", Schema::number("Quantity of the item")),
                ("unit_price", Schema::number("Price per unit")),
                ("total_price", Schema::number("Total price for the line item")),
            ])),
        ),
        (
            "subtotal",
            Schema::number("Sum of all line item totals before tax and discounts"),
        ),
        (
            "tax",
            Schema::object([
                ("tax_rate", Schema::number("Tax rate percentage")),
                ("tax_amount", Schema::number("Total tax amount")),
                ("tax_type", Schema::string("Type of tax (e.g., VAT, Sales Tax)")),
            ]),
        ),
        (
            "total_amount",
            Schema::number("Final total amount including tax and discounts"),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::location::DEFAULT_LOCATIONS;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_top_level_order() {
        let schema = invoice_schema(&DEFAULT_LOCATIONS);
        let Schema::Object { properties, .. } = &schema else {
            panic!("invoice schema must be an object");
        };
        let names: Vec<&str> = properties.iter().map(|(n, _)| n.as_str()).collect();

        assert_eq!(
            names,
            vec![
                "invoice_number",
                "invoice_date",
                "vendor",
                "ship_to",
                "line_items",
                "subtotal",
                "tax",
                "total_amount"
            ]
        );
    }

    #[test]
    fn test_gemini_rendering() {
        let schema = invoice_schema(&["SAWTELLE", "PASADENA"]);
        let rendered = schema.to_gemini();

        assert_eq!(rendered["type"], "OBJECT");
        assert_eq!(rendered["propertyOrdering"][0], "invoice_number");
        assert_eq!(rendered["properties"]["line_items"]["type"], "ARRAY");
        assert_eq!(
            rendered["properties"]["line_items"]["items"]["properties"]["quantity"]["type"],
            "NUMBER"
        );
        assert_eq!(
            rendered["properties"]["ship_to"]["properties"]["location"]["description"],
            "Extracted location name from the ship_to name (either SAWTELLE, PASADENA)"
        );
    }
}
