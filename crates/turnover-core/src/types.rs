//! Record, feature vector and verdict types

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Ordered list of columns a trained classifier requires
pub type ClassifierSchema = Arc<[String]>;

/// A single attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
    /// Null produced by a derivation (e.g. a value outside every bin)
    Missing,
}

impl Value {
    /// Numeric view of the value, `None` for text and missing values
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Text(_) | Self::Missing => None,
        }
    }

    /// Text view of the value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Whether the value is a derivation null
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// Boolean flag encoded the way the training frame stored it
    pub fn flag(on: bool) -> Self {
        Self::Int(on as i64)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(s) => f.write_str(s),
            Self::Missing => f.write_str("<missing>"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Raw attributes for one prediction request, as collected by the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord {
    attributes: BTreeMap<String, Value>,
}

impl RawRecord {
    /// Build a record from `(name, value)` pairs
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            attributes: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Value of an attribute, if supplied
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Whether the attribute was supplied
    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Number of supplied attributes
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Whether no attributes were supplied
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Attributes in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Working copy of a record while it moves through encoding and derivation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    /// Empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of a field, if present
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Whether the field is present
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Insert or replace a field, returning the previous value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    /// Drop a field, returning its value
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    /// Numeric value of a field; `Ok(None)` when the field holds a null
    pub fn numeric(&self, name: &str) -> Result<Option<f64>> {
        match self.fields.get(name) {
            None => Err(Error::missing_attribute(name)),
            Some(Value::Missing) => Ok(None),
            Some(value) => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| Error::non_numeric(name)),
        }
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Consume the record into its field map
    pub fn into_fields(self) -> BTreeMap<String, Value> {
        self.fields
    }
}

impl From<&RawRecord> for Record {
    fn from(raw: &RawRecord) -> Self {
        Self {
            fields: raw.attributes.clone(),
        }
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Numeric input row whose columns follow a classifier schema exactly
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    columns: ClassifierSchema,
    values: Vec<f64>,
}

impl FeatureVector {
    /// Pair a schema with its values; lengths must agree
    pub fn new(columns: ClassifierSchema, values: Vec<f64>) -> Result<Self> {
        if columns.len() != values.len() {
            return Err(Error::schema(format!(
                "{} columns but {} values",
                columns.len(),
                values.len()
            )));
        }
        Ok(Self { columns, values })
    }

    /// Column names in schema order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values in column order, ready for positional models
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value of a named column
    pub fn get(&self, column: &str) -> Option<f64> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| self.values[idx])
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the vector has no columns
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(column, value)` pairs in schema order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

/// Risk verdict for one prediction request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Human-readable label (e.g. "leave", "High risk")
    pub label: String,

    /// Raw class predicted by the classifier (0 or 1)
    pub predicted_class: u8,

    /// Probability mass of the predicted class, when the model provides one
    pub confidence: Option<f64>,
}

impl Verdict {
    /// Confidence as a percentage rounded to two decimals
    pub fn confidence_percent(&self) -> Option<f64> {
        self.confidence.map(|c| (c * 10_000.0).round() / 100.0)
    }

    /// Whether the verdict is the positive (leave / high-risk) class
    pub fn is_positive(&self) -> bool {
        self.predicted_class == 1
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.confidence {
            Some(c) => write!(f, "{} ({:.2}%)", self.label, c * 100.0),
            None => f.write_str(&self.label),
        }
    }
}
