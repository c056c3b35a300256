//! Invoice record produced from vision model output.
//!
//! Every field is optional: the record is always serialized in full, with
//! absent values written as `null`, so downstream consumers can rely on a
//! fixed shape.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::NormalizeError;

/// A parsed invoice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Invoice {
    /// The unique identifier printed on the invoice.
    #[serde(deserialize_with = "lenient::text")]
    pub invoice_number: Option<String>,

    /// Issue date as printed; not reformatted.
    #[serde(deserialize_with = "lenient::text")]
    pub invoice_date: Option<String>,

    /// Seller.
    #[serde(deserialize_with = "lenient::object")]
    pub vendor: Vendor,

    /// Receiving restaurant.
    #[serde(deserialize_with = "lenient::object")]
    pub ship_to: ShipTo,

    /// Line items in document order.
    #[serde(deserialize_with = "lenient::line_items")]
    pub line_items: Vec<LineItem>,

    /// Sum of line totals before tax.
    #[serde(with = "lenient::amount")]
    pub subtotal: Option<Decimal>,

    /// Tax summary.
    #[serde(deserialize_with = "lenient::object")]
    pub tax: Tax,

    /// Final amount including tax.
    #[serde(with = "lenient::amount")]
    pub total_amount: Option<Decimal>,
}

/// Vendor block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vendor {
    #[serde(deserialize_with = "lenient::text")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub address: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub tel: Option<String>,
}

/// Ship-to block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShipTo {
    /// Restaurant name, e.g. "DAN MODERN CHINESE #4".
    #[serde(deserialize_with = "lenient::text")]
    pub name: Option<String>,

    /// Canonical branch name from the known location list.
    #[serde(deserialize_with = "lenient::text")]
    pub location: Option<String>,

    #[serde(deserialize_with = "lenient::text")]
    pub address: Option<String>,
}

/// A single line item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineItem {
    #[serde(deserialize_with = "lenient::text")]
    pub item_name: Option<String>,

    #[serde(with = "lenient::amount")]
    pub total_weight: Option<Decimal>,

    /// Unit of measure (cs, bg, pk, ...).
    #[serde(deserialize_with = "lenient::text")]
    pub unit_measure: Option<String>,

    #[serde(with = "lenient::amount")]
    pub quantity: Option<Decimal>,

    #[serde(with = "lenient::amount")]
    pub unit_price: Option<Decimal>,

    #[serde(with = "lenient::amount")]
    pub total_price: Option<Decimal>,
}

/// Tax block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tax {
    /// Rate as a percentage.
    #[serde(with = "lenient::amount")]
    pub tax_rate: Option<Decimal>,

    #[serde(with = "lenient::amount")]
    pub tax_amount: Option<Decimal>,

    /// VAT, Sales Tax, ...
    #[serde(deserialize_with = "lenient::text")]
    pub tax_type: Option<String>,
}

impl Invoice {
    /// Build the typed record from a schema-normalized JSON value.
    pub fn from_value(value: Value) -> Result<Self, NormalizeError> {
        serde_json::from_value(value).map_err(NormalizeError::Shape)
    }

    /// Sum of the line totals that are present.
    pub fn line_total(&self) -> Decimal {
        self.line_items.iter().filter_map(|i| i.total_price).sum()
    }

    /// Validate the invoice data and return any issues found.
    ///
    /// Issues are advisory; the record is written regardless.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let tolerance = Decimal::new(1, 2);

        if self.invoice_number.is_none() {
            issues.push("Missing invoice number".to_string());
        }

        if self.vendor.name.is_none() {
            issues.push("Missing vendor name".to_string());
        }

        if self.line_items.is_empty() {
            issues.push("No line items".to_string());
        }

        if let Some(subtotal) = self.subtotal {
            let calculated = self.line_total();
            if !self.line_items.is_empty() && (calculated - subtotal).abs() > tolerance {
                issues.push(format!(
                    "Line item total ({}) differs from subtotal ({})",
                    calculated, subtotal
                ));
            }
        }

        if let (Some(subtotal), Some(total)) = (self.subtotal, self.total_amount) {
            let tax = self.tax.tax_amount.unwrap_or(Decimal::ZERO);
            if (subtotal + tax - total).abs() > tolerance {
                issues.push(format!(
                    "Subtotal ({}) plus tax ({}) differs from total ({})",
                    subtotal, tax, total
                ));
            }
        }

        issues
    }
}

/// Render a decimal as a JSON number, integral values without a fraction.
///
/// The digits are kept exactly (serde_json `arbitrary_precision`).
pub(crate) fn decimal_to_value(amount: &Decimal) -> Value {
    match serde_json::from_str::<Value>(&amount.normalize().to_string()) {
        Ok(number @ Value::Number(_)) => number,
        _ => Value::Null,
    }
}

/// Parse an amount from loosely formatted model output.
///
/// Accepts JSON numbers and strings such as `"$1,234.50"` or `"9.5%"`.
pub fn parse_amount(value: &Value) -> Option<Decimal> {
    use std::str::FromStr;

    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => {
            let stripped: String = s
                .chars()
                .filter(|c| !matches!(c, '$' | '€' | '£' | ',' | '%'))
                .collect();
            let trimmed = stripped.trim();
            if trimmed.contains(char::is_whitespace) {
                return None;
            }
            trimmed.to_string()
        }
        _ => return None,
    };

    if text.is_empty() {
        return None;
    }

    // (12.00) is an accounting negative
    let (negative, digits) = match text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, text.as_str()),
    };

    let parsed = Decimal::from_str(digits)
        .or_else(|_| Decimal::from_scientific(digits))
        .ok()?;

    Some(if negative { -parsed } else { parsed })
}

mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;
    use tracing::warn;

    use super::LineItem;

    pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::String(s)) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Bool(b)) => Some(b.to_string()),
            _ => None,
        })
    }

    pub fn object<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + Default,
    {
        Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
    }

    pub fn line_items<'de, D>(deserializer: D) -> Result<Vec<LineItem>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let values = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
        let mut items = Vec::with_capacity(values.len());

        for (index, value) in values.into_iter().enumerate() {
            if !value.is_object() {
                warn!("Dropping line item {} that is not an object: {}", index + 1, value);
                continue;
            }
            match serde_json::from_value(value) {
                Ok(item) => items.push(item),
                Err(e) => warn!("Dropping malformed line item {}: {}", index + 1, e),
            }
        }

        Ok(items)
    }

    pub mod amount {
        use rust_decimal::Decimal;
        use serde::{Deserialize, Deserializer, Serialize, Serializer};
        use serde_json::Value;

        use super::super::{decimal_to_value, parse_amount};

        pub fn serialize<S>(amount: &Option<Decimal>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match amount {
                Some(d) => decimal_to_value(d).serialize(serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let value = Option::<Value>::deserialize(deserializer)?;
            Ok(value.as_ref().and_then(parse_amount))
        }
    }
}
