//! Record type definitions

use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, VaultError};

/// Field holding the owner identifier on every stored record
pub const OWNER_FIELD: &str = "userId";
/// Creation timestamp field
pub const CREATED_AT_FIELD: &str = "createdAt";
/// Last update timestamp field
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// A single attribute value of a record
///
/// Only `Text` values are ever passed through the cipher.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Timestamp(DateTime<Utc>),
    Null,
    /// Numbers, booleans, nested objects and arrays from the record store
    Other(serde_json::Value),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(value)
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => FieldValue::Text(s),
            serde_json::Value::Null => FieldValue::Null,
            other => FieldValue::Other(other),
        }
    }
}

impl From<FieldValue> for serde_json::Value {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Text(s) => serde_json::Value::String(s),
            FieldValue::Timestamp(ts) => serde_json::Value::String(ts.to_rfc3339()),
            FieldValue::Null => serde_json::Value::Null,
            FieldValue::Other(v) => v,
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            FieldValue::Text(s) => serializer.serialize_str(s),
            FieldValue::Timestamp(ts) => serializer.collect_str(&ts.to_rfc3339()),
            FieldValue::Null => serializer.serialize_none(),
            FieldValue::Other(v) => v.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(serde_json::Value::deserialize(deserializer)?.into())
    }
}

/// Ordered mapping of field name to value, as read from or written to the record store
///
/// `createdAt` and `updatedAt` strings that parse as RFC 3339 are read back as
/// [`FieldValue::Timestamp`], so a stamped record survives a JSON round trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SensitiveRecord {
    fields: IndexMap<String, FieldValue>,
}

impl SensitiveRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// New record stamped with its owner and creation time
    pub fn owned_by(owner_id: &str) -> Self {
        let mut record = Self::new();
        record.insert(OWNER_FIELD, owner_id);
        record.insert(CREATED_AT_FIELD, Utc::now());
        record
    }

    /// Insert or replace a field, keeping its original position if it existed
    pub fn insert(&mut self, name: &str, value: impl Into<FieldValue>) -> Option<FieldValue> {
        self.fields.insert(name.to_string(), value.into())
    }

    /// Builder-style insert
    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut FieldValue> {
        self.fields.get_mut(name)
    }

    /// Text value of a field, if present and textual
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_text)
    }

    pub fn owner_id(&self) -> Option<&str> {
        self.text(OWNER_FIELD)
    }

    /// Stamp the update time
    pub fn touch(&mut self) {
        self.insert(UPDATED_AT_FIELD, Utc::now());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build from a JSON object as returned by the record store
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Object(map) => {
                Ok(map.into_iter().collect::<Self>().restore_timestamps())
            }
            other => Err(VaultError::InvalidInput(format!(
                "Record must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    fn restore_timestamps(mut self) -> Self {
        for name in [CREATED_AT_FIELD, UPDATED_AT_FIELD] {
            let parsed = self
                .text(name)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|ts| ts.with_timezone(&Utc));
            if let Some(ts) = parsed {
                self.insert(name, ts);
            }
        }
        self
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.clone().into()))
                .collect(),
        )
    }
}

impl<'de> Deserialize<'de> for SensitiveRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let fields = IndexMap::<String, FieldValue>::deserialize(deserializer)?;
        Ok(Self { fields }.restore_timestamps())
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for SensitiveRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Names of the fields routed through the cipher
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensitiveFields {
    names: IndexSet<String>,
}

impl SensitiveFields {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a comma-separated list, ignoring blanks
    pub fn parse_list(list: &str) -> Self {
        Self::new(list.split(',').map(str::trim).filter(|s| !s.is_empty()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<'a> From<&'a [&'a str]> for SensitiveFields {
    fn from(names: &'a [&'a str]) -> Self {
        Self::new(names.iter().copied())
    }
}
