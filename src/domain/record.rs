//! Records, schemas and datasets
//!
//! A [`Record`] is an ordered mapping from field name to [`FieldValue`]. A
//! [`Dataset`] is an ordered sequence of records sharing one [`Schema`]; it is
//! both the unit the pipeline processes as a batch and the unit the risk
//! evaluator reasons about.

use super::errors::VeilError;
use super::result::Result;
use super::value::{FieldType, FieldValue};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Declaration of one schema field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name
    pub name: String,

    /// Declared type
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl FieldSpec {
    /// Create a new field declaration
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// Ordered field declarations shared by every record of a dataset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    fields: Vec<FieldSpec>,
}

impl Schema {
    /// Build a schema, rejecting duplicate or empty field names
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self> {
        let schema = Self { fields };
        schema.validate()?;
        Ok(schema)
    }

    /// Check field names are non-empty and unique
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for spec in &self.fields {
            if spec.name.trim().is_empty() {
                return Err(VeilError::Validation(
                    "Schema field names cannot be empty".to_string(),
                ));
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(VeilError::Validation(format!(
                    "Duplicate schema field '{}'",
                    spec.name
                )));
            }
        }
        Ok(())
    }

    /// Declared fields in order
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Declared type of a field, if the schema knows it
    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.fields
            .iter()
            .find(|spec| spec.name == name)
            .map(|spec| spec.field_type)
    }

    /// Whether the schema declares this field
    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|spec| spec.name == name)
    }
}

/// One record: field names mapped to values, in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, FieldValue)>,
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(name, value.into());
        self
    }

    /// Set a field, replacing an existing value in place or appending a new field
    pub fn set(&mut self, name: impl Into<String>, value: FieldValue) {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Look up a field value
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }

    /// Iterate over fields in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parse a JSON object against a schema
    ///
    /// Declared fields come first in schema order (missing ones become null);
    /// undeclared fields follow in input order and are parsed untyped.
    pub fn from_json(object: &Map<String, Value>, schema: &Schema) -> Result<Self> {
        let mut record = Record::new();

        for spec in schema.fields() {
            let value = match object.get(&spec.name) {
                Some(raw) => FieldValue::from_json(raw, spec.field_type).map_err(|e| {
                    VeilError::Validation(format!("field '{}': {e}", spec.name))
                })?,
                None => FieldValue::Null,
            };
            record.fields.push((spec.name.clone(), value));
        }

        for (name, raw) in object {
            if schema.contains(name) {
                continue;
            }
            let value = FieldValue::from_json_untyped(raw)
                .map_err(|e| VeilError::Validation(format!("field '{name}': {e}")))?;
            record.fields.push((name.clone(), value));
        }

        Ok(record)
    }

    /// Render as a JSON object preserving field order
    pub fn to_json(&self) -> Value {
        let mut map = Map::with_capacity(self.fields.len());
        for (name, value) in &self.fields {
            map.insert(name.clone(), value.to_json());
        }
        Value::Object(map)
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Wire shape of a dataset file: `{"schema": [...], "records": [{...}]}`
#[derive(Debug, Deserialize)]
struct RawDataset {
    schema: Schema,
    #[serde(default)]
    records: Vec<Map<String, Value>>,
}

/// Records sharing one schema
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Dataset {
    /// Declared schema
    pub schema: Schema,

    /// Records in input order
    pub records: Vec<Record>,
}

impl Dataset {
    /// Create a dataset
    pub fn new(schema: Schema, records: Vec<Record>) -> Self {
        Self { schema, records }
    }

    /// Parse a dataset from its JSON file representation
    ///
    /// # Examples
    ///
    /// ```
    /// use veil::domain::Dataset;
    ///
    /// let dataset = Dataset::from_json_str(r#"{
    ///     "schema": [{"name": "zip", "type": "postal_code"}],
    ///     "records": [{"zip": "28045"}]
    /// }"#).unwrap();
    /// assert_eq!(dataset.len(), 1);
    /// ```
    pub fn from_json_str(input: &str) -> Result<Self> {
        let raw: RawDataset = serde_json::from_str(input)?;
        raw.schema.validate()?;

        let records = raw
            .records
            .iter()
            .enumerate()
            .map(|(index, object)| {
                Record::from_json(object, &raw.schema).map_err(|e| {
                    VeilError::Validation(format!("record {index}: {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            schema: raw.schema,
            records,
        })
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
