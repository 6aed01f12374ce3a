//! Typed field values and declared field types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Declared type of a schema field
///
/// The declared type decides how a value is parsed from JSON, which shape the
/// mask operator expects, and which `type` policies match the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Free text
    Text,
    /// Email address
    Email,
    /// Telephone number
    Phone,
    /// Payment card number
    CardNumber,
    /// Any other numeric-ish identifier (account, MRN, national id)
    Identifier,
    /// Postal or ZIP code
    PostalCode,
    /// Whole number
    Integer,
    /// Floating point number
    Decimal,
    /// Calendar date (YYYY-MM-DD)
    Date,
}

impl FieldType {
    /// Whether values of this type are carried as text
    pub fn is_textual(&self) -> bool {
        !matches!(self, Self::Integer | Self::Decimal | Self::Date)
    }

    /// Canonical lowercase name as used in configuration files
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::CardNumber => "card_number",
            Self::Identifier => "identifier",
            Self::PostalCode => "postal_code",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Date => "date",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "string" => Ok(Self::Text),
            "email" => Ok(Self::Email),
            "phone" => Ok(Self::Phone),
            "card_number" | "card" => Ok(Self::CardNumber),
            "identifier" | "id" => Ok(Self::Identifier),
            "postal_code" | "zip" => Ok(Self::PostalCode),
            "integer" | "int" => Ok(Self::Integer),
            "decimal" | "number" | "float" => Ok(Self::Decimal),
            "date" => Ok(Self::Date),
            _ => Err(format!("Unknown field type: {s}")),
        }
    }
}

/// A single typed field value
///
/// Serializes to plain JSON: `null`, strings, numbers and `YYYY-MM-DD` dates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Missing or explicitly null
    Null,
    /// Text
    Text(String),
    /// Whole number
    Integer(i64),
    /// Floating point number
    Decimal(f64),
    /// Calendar date
    Date(NaiveDate),
}

impl FieldValue {
    /// Parse a JSON value according to the declared field type
    ///
    /// # Errors
    ///
    /// Returns a description of the mismatch when the JSON value cannot represent
    /// the declared type (arrays, objects, unparseable numbers or dates).
    pub fn from_json(value: &Value, field_type: FieldType) -> Result<Self, String> {
        match (value, field_type) {
            (Value::Null, _) => Ok(Self::Null),
            (Value::Array(_) | Value::Object(_), _) => {
                Err(format!("expected a scalar {field_type} value"))
            }
            (Value::String(s), FieldType::Date) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(Self::Date)
                .map_err(|e| format!("invalid date '{s}': {e}")),
            (_, FieldType::Date) => Err("expected a YYYY-MM-DD date string".to_string()),
            (Value::Number(n), FieldType::Integer) => match n.as_i64() {
                Some(i) => Ok(Self::Integer(i)),
                None => match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                        Ok(Self::Integer(f as i64))
                    }
                    _ => Err(format!("expected an integer, got {n}")),
                },
            },
            (Value::String(s), FieldType::Integer) => s
                .trim()
                .parse::<i64>()
                .map(Self::Integer)
                .map_err(|_| format!("expected an integer, got '{s}'")),
            (Value::Number(n), FieldType::Decimal) => n
                .as_f64()
                .map(Self::Decimal)
                .ok_or_else(|| format!("expected a number, got {n}")),
            (Value::String(s), FieldType::Decimal) => s
                .trim()
                .parse::<f64>()
                .map(Self::Decimal)
                .map_err(|_| format!("expected a number, got '{s}'")),
            (Value::Bool(_), FieldType::Integer | FieldType::Decimal) => {
                Err("expected a number, got a boolean".to_string())
            }
            (Value::String(s), _) => Ok(Self::Text(s.clone())),
            (Value::Number(n), _) => Ok(Self::Text(n.to_string())),
            (Value::Bool(b), _) => Ok(Self::Text(b.to_string())),
        }
    }

    /// Parse a JSON value for a field that is not declared in the schema
    pub fn from_json_untyped(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(Self::Null),
            Value::String(s) => Ok(Self::Text(s.clone())),
            Value::Bool(b) => Ok(Self::Text(b.to_string())),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Self::Integer(i)),
                None => n
                    .as_f64()
                    .map(Self::Decimal)
                    .ok_or_else(|| format!("unrepresentable number {n}")),
            },
            Value::Array(_) | Value::Object(_) => Err("expected a scalar value".to_string()),
        }
    }

    /// Convert back to JSON
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Text(s) => Value::String(s.clone()),
            Self::Integer(i) => Value::from(*i),
            Self::Decimal(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
        }
    }

    /// Whether the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Decimal(f) => Some(*f),
            Self::Text(s) => s.trim().parse::<f64>().ok(),
            Self::Null | Self::Date(_) => None,
        }
    }

    /// Text view of scalar values (dates as YYYY-MM-DD); `None` for null
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Text(s) => Some(s.clone()),
            Self::Integer(i) => Some(i.to_string()),
            Self::Decimal(f) => Some(f.to_string()),
            Self::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
        }
    }

    /// Type-tagged representation used as an equivalence key
    ///
    /// `Integer(5)` and `Text("5")` produce different keys.
    pub fn canonical_key(&self) -> String {
        match self {
            Self::Null => "n:".to_string(),
            Self::Text(s) => format!("t:{s}"),
            Self::Integer(i) => format!("i:{i}"),
            Self::Decimal(f) => format!("d:{f}"),
            Self::Date(d) => format!("D:{d}"),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_text() {
            Some(text) => f.write_str(&text),
            None => f.write_str("null"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        Self::Decimal(f)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}
