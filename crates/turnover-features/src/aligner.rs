//! Schema alignment
//!
//! Turns an encoded, derived record into a [`FeatureVector`] whose columns are
//! exactly the classifier's declared schema:
//! 1. one-hot expansion of nominal attributes (`attribute_category` columns)
//! 2. zero-fill of schema columns the record cannot produce
//! 3. pruning of extra columns and reordering to schema order
//! 4. integrity check: no null, text or non-finite value may survive

use crate::classifier::Classifier;
use std::collections::HashSet;
use tracing::{debug, trace};
use turnover_core::{ClassifierSchema, Error, FeatureVector, Record, Result, Value};

/// Aligns records to one classifier schema
#[derive(Debug, Clone)]
pub struct SchemaAligner {
    schema: ClassifierSchema,
    one_hot: Vec<String>,
}

impl SchemaAligner {
    /// Create an aligner for a schema and the attributes to dummy-expand
    pub fn new(schema: ClassifierSchema, one_hot: Vec<String>) -> Result<Self> {
        if schema.is_empty() {
            return Err(Error::config("classifier schema is empty"));
        }

        let mut seen = HashSet::new();
        for column in schema.iter() {
            if !seen.insert(column.as_str()) {
                return Err(Error::config(format!(
                    "classifier schema lists column '{}' twice",
                    column
                )));
            }
        }

        Ok(Self { schema, one_hot })
    }

    /// Create an aligner from the schema the classifier declares
    pub fn from_classifier(classifier: &dyn Classifier, one_hot: Vec<String>) -> Result<Self> {
        let names = classifier.feature_names().ok_or_else(|| {
            Error::config(format!(
                "classifier '{}' does not declare its required feature names",
                classifier.name()
            ))
        })?;

        Self::new(ClassifierSchema::from(names), one_hot)
    }

    /// Declared column order
    pub fn schema(&self) -> &ClassifierSchema {
        &self.schema
    }

    /// Attributes expanded into dummy columns
    pub fn one_hot(&self) -> &[String] {
        &self.one_hot
    }

    /// Replace each nominal attribute with an `attribute_category = 1` column
    pub fn expand(&self, mut record: Record) -> Result<Record> {
        for attribute in &self.one_hot {
            let category = match record.remove(attribute) {
                None | Some(Value::Missing) => return Err(Error::missing_attribute(attribute)),
                Some(value) => value.to_string(),
            };

            let column = format!("{}_{}", attribute, category);
            if record.contains(&column) {
                return Err(Error::schema(format!(
                    "dummy column '{}' collides with an existing feature",
                    column
                )));
            }
            record.insert(column, 1);
        }
        Ok(record)
    }

    /// Expand, reconcile, prune, reorder and check the record
    pub fn align(&self, record: Record) -> Result<FeatureVector> {
        let mut fields = self.expand(record)?.into_fields();

        let mut filled = 0usize;
        let aligned: Vec<(&str, Value)> = self
            .schema
            .iter()
            .map(|column| {
                let value = fields.remove(column).unwrap_or_else(|| {
                    filled += 1;
                    Value::Int(0)
                });
                (column.as_str(), value)
            })
            .collect();

        if filled > 0 {
            debug!("Zero-filled {} schema columns absent from the record", filled);
        }
        for pruned in fields.keys() {
            trace!("Dropped column '{}' not in classifier schema", pruned);
        }

        let values = integrity_check(&aligned)?;
        FeatureVector::new(self.schema.clone(), values)
    }
}

/// Reject any aligned value the classifier cannot consume
fn integrity_check(aligned: &[(&str, Value)]) -> Result<Vec<f64>> {
    aligned
        .iter()
        .map(|(column, value)| match value {
            Value::Int(v) => Ok(*v as f64),
            Value::Float(v) if v.is_finite() => Ok(*v),
            Value::Float(_) | Value::Missing => Err(Error::missing_value(*column)),
            Value::Text(text) => Err(Error::schema(format!(
                "column '{}' still holds text '{}'; it is neither encoded nor one-hot expanded",
                column, text
            ))),
        })
        .collect()
}
