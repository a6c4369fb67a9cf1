//! Category encoding
//!
//! Categorical attributes are replaced by the integer codes the classifier was
//! trained on. Two strategies exist and exactly one is fixed at startup:
//! - a static [`EncodingTable`] kept in lock-step with the training table
//! - [`FittedEncoders`] loaded from a persisted label-encoder artifact
//!
//! A value outside the known vocabulary is always an
//! [`Error::UnknownCategory`], never a substituted default.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{debug, info};
use turnover_core::{Error, Record, Result, Value};

/// Static category -> code lookup, one table per attribute
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodingTable {
    tables: BTreeMap<String, BTreeMap<String, i64>>,
}

impl EncodingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the mapping for one attribute
    pub fn with_attribute<S: Into<String>>(
        mut self,
        attribute: impl Into<String>,
        codes: impl IntoIterator<Item = (S, i64)>,
    ) -> Self {
        self.tables.insert(
            attribute.into(),
            codes.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        );
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Attributes covered by the table
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Look up the code of a category
    pub fn lookup(&self, attribute: &str, category: &str) -> Result<i64> {
        self.tables
            .get(attribute)
            .and_then(|codes| codes.get(category))
            .copied()
            .ok_or_else(|| Error::unknown_category(attribute, category))
    }

    fn is_code(&self, attribute: &str, code: i64) -> bool {
        self.tables
            .get(attribute)
            .is_some_and(|codes| codes.values().any(|c| *c == code))
    }
}

/// A label encoder fitted at training time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedEncoder {
    classes: Vec<String>,
}

impl FittedEncoder {
    /// Build from the fitted classes; the code of a class is its position
    pub fn new(classes: Vec<String>) -> Result<Self> {
        let encoder = Self { classes };
        encoder.validate()?;
        Ok(encoder)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Transform a category into its code
    pub fn transform(&self, attribute: &str, value: &str) -> Result<i64> {
        self.classes
            .iter()
            .position(|c| c == value)
            .map(|idx| idx as i64)
            .ok_or_else(|| Error::unknown_category(attribute, value))
    }

    fn validate(&self) -> Result<()> {
        if self.classes.is_empty() {
            return Err(Error::config("fitted encoder has no classes"));
        }
        let mut seen = HashSet::new();
        for class in &self.classes {
            if !seen.insert(class) {
                return Err(Error::config(format!(
                    "fitted encoder lists class '{}' twice",
                    class
                )));
            }
        }
        Ok(())
    }
}

/// Fitted encoders keyed by attribute name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FittedEncoders {
    encoders: BTreeMap<String, FittedEncoder>,
}

impl FittedEncoders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, attribute: impl Into<String>, encoder: FittedEncoder) {
        self.encoders.insert(attribute.into(), encoder);
    }

    pub fn get(&self, attribute: &str) -> Option<&FittedEncoder> {
        self.encoders.get(attribute)
    }

    pub fn len(&self) -> usize {
        self.encoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoders.is_empty()
    }

    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.encoders.keys().map(String::as_str)
    }

    /// Parse from a JSON document `{"attr": {"classes": [...]}}`
    pub fn from_json(json: &str) -> Result<Self> {
        let encoders: Self = serde_json::from_str(json)?;
        for (attribute, encoder) in &encoders.encoders {
            encoder
                .validate()
                .map_err(|e| Error::config(format!("encoder for '{}': {}", attribute, e)))?;
        }
        Ok(encoders)
    }

    /// Load the encoder artifact from disk
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::artifact(path, format!("cannot read: {}", e)))?;
        let encoders =
            Self::from_json(&content).map_err(|e| Error::artifact(path, e.to_string()))?;

        info!(
            "Loaded {} fitted encoders from {}",
            encoders.len(),
            path.display()
        );
        Ok(encoders)
    }
}

/// Encoding strategy, selected once at startup
#[derive(Debug, Clone)]
pub enum EncodingStrategy {
    /// Hand-maintained lookup table
    StaticTable(EncodingTable),

    /// Label encoders persisted at training time
    Fitted(FittedEncoders),
}

impl EncodingStrategy {
    /// Pick the strategy from the available artifacts.
    ///
    /// A configured encoder artifact wins and must load; otherwise the static
    /// table is used. Having neither is a configuration error.
    pub fn select(table: Option<EncodingTable>, encoders_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = encoders_path {
            let encoders = FittedEncoders::from_file(path)?;
            info!("Using fitted-encoder strategy ({} attributes)", encoders.len());
            return Ok(Self::Fitted(encoders));
        }

        match table {
            Some(table) if !table.is_empty() => {
                info!("Using static encoding table");
                Ok(Self::StaticTable(table))
            }
            _ => Err(Error::config(
                "no encoding table in profile and no encoder artifact configured",
            )),
        }
    }

    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StaticTable(_) => "static_table",
            Self::Fitted(_) => "fitted",
        }
    }

    /// Attributes this strategy encodes
    pub fn attributes(&self) -> Vec<&str> {
        match self {
            Self::StaticTable(table) => table.attributes().collect(),
            Self::Fitted(encoders) => encoders.attributes().collect(),
        }
    }

    /// Replace every covered categorical attribute with its code
    pub fn encode(&self, record: &mut Record) -> Result<()> {
        for attribute in self.attributes() {
            let value = record
                .get(attribute)
                .ok_or_else(|| Error::missing_attribute(attribute))?;
            let code = self.encode_value(attribute, value)?;
            debug!("Encoded {}={} as {}", attribute, value, code);
            record.insert(attribute, code);
        }
        Ok(())
    }

    /// Code the active strategy assigns to a category
    pub fn code_for(&self, attribute: &str, category: &str) -> Result<i64> {
        match self {
            Self::StaticTable(table) => table.lookup(attribute, category),
            Self::Fitted(encoders) => encoders
                .get(attribute)
                .ok_or_else(|| Error::config(format!("no encoder for '{}'", attribute)))?
                .transform(attribute, category),
        }
    }

    fn encode_value(&self, attribute: &str, value: &Value) -> Result<i64> {
        match value {
            Value::Text(category) => self.code_for(attribute, category),
            // Already-encoded values pass through so encoding stays idempotent
            Value::Int(code) if self.is_code(attribute, *code) => Ok(*code),
            Value::Float(v) if v.fract() == 0.0 && self.is_code(attribute, *v as i64) => {
                Ok(*v as i64)
            }
            Value::Missing => Err(Error::missing_attribute(attribute)),
            other => Err(Error::unknown_category(attribute, other.to_string())),
        }
    }

    fn is_code(&self, attribute: &str, code: i64) -> bool {
        match self {
            Self::StaticTable(table) => table.is_code(attribute, code),
            Self::Fitted(encoders) => encoders
                .get(attribute)
                .is_some_and(|e| code >= 0 && (code as usize) < e.classes.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coach_table() -> EncodingTable {
        EncodingTable::new()
            .with_attribute("coach", [("no", 0), ("yes", 1), ("my head", 2)])
            .with_attribute("traffic", [("low", 0), ("medium", 1), ("high", 2)])
    }

    fn record(coach: &str) -> Record {
        let mut record = Record::new();
        record.insert("coach", coach);
        record.insert("traffic", "high");
        record.insert("age", 30);
        record
    }

    #[test]
    fn test_static_table_encoding() {
        let strategy = EncodingStrategy::StaticTable(coach_table());
        let mut rec = record("yes");
        strategy.encode(&mut rec).unwrap();

        assert_eq!(rec.get("coach"), Some(&Value::Int(1)));
        assert_eq!(rec.get("traffic"), Some(&Value::Int(2)));
        assert_eq!(rec.get("age"), Some(&Value::Int(30)));
    }

    #[test]
    fn test_training_only_category_is_known() {
        let strategy = EncodingStrategy::StaticTable(coach_table());
        let mut rec = record("my head");
        strategy.encode(&mut rec).unwrap();
        assert_eq!(rec.get("coach"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_unknown_category_is_error() {
        let strategy = EncodingStrategy::StaticTable(coach_table());
        let mut rec = record("sometimes");
        match strategy.encode(&mut rec) {
            Err(Error::UnknownCategory { attribute, value }) => {
                assert_eq!(attribute, "coach");
                assert_eq!(value, "sometimes");
            }
            other => panic!("expected unknown category, got {:?}", other),
        }
    }

    #[test]
    fn test_encoding_is_idempotent() {
        let strategy = EncodingStrategy::StaticTable(coach_table());
        let mut once = record("no");
        strategy.encode(&mut once).unwrap();
        let mut twice = once.clone();
        strategy.encode(&mut twice).unwrap();
        assert_eq!(once, twice);

        let mut bogus = record("no");
        bogus.insert("coach", 7);
        assert!(strategy.encode(&mut bogus).is_err());
    }

    #[test]
    fn test_missing_attribute() {
        let strategy = EncodingStrategy::StaticTable(coach_table());
        let mut rec = Record::new();
        rec.insert("traffic", "low");
        assert!(matches!(
            strategy.encode(&mut rec),
            Err(Error::MissingAttribute(a)) if a == "coach"
        ));
    }

    #[test]
    fn test_fitted_encoders() {
        let encoders = FittedEncoders::from_json(
            r#"{"coach": {"classes": ["my head", "no", "yes"]},
                "traffic": {"classes": ["high", "low", "medium"]}}"#,
        )
        .unwrap();
        let strategy = EncodingStrategy::Fitted(encoders);

        let mut rec = record("yes");
        strategy.encode(&mut rec).unwrap();
        assert_eq!(rec.get("coach"), Some(&Value::Int(2)));
        assert_eq!(rec.get("traffic"), Some(&Value::Int(0)));

        let mut unseen = record("sometimes");
        assert!(matches!(
            strategy.encode(&mut unseen),
            Err(Error::UnknownCategory { .. })
        ));
    }

    #[test]
    fn test_code_for_follows_class_order() {
        let table = EncodingStrategy::StaticTable(coach_table());
        assert_eq!(table.code_for("coach", "yes").unwrap(), 1);

        let encoders =
            FittedEncoders::from_json(r#"{"coach": {"classes": ["no", "yes"]}}"#).unwrap();
        let fitted = EncodingStrategy::Fitted(encoders);
        assert_eq!(fitted.code_for("coach", "yes").unwrap(), 1);
        assert_eq!(fitted.code_for("coach", "no").unwrap(), 0);
        assert!(matches!(
            fitted.code_for("coach", "my head"),
            Err(Error::UnknownCategory { .. })
        ));
        assert!(matches!(
            fitted.code_for("traffic", "low"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_fitted_encoder_rejects_duplicates() {
        assert!(FittedEncoder::new(vec!["a".into(), "a".into()]).is_err());
        assert!(FittedEncoders::from_json(r#"{"x": {"classes": []}}"#).is_err());
    }

    #[test]
    fn test_select_strategy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("encoders.json");
        std::fs::write(&path, r#"{"coach": {"classes": ["no", "yes"]}}"#).unwrap();

        let fitted = EncodingStrategy::select(Some(coach_table()), Some(path.as_path())).unwrap();
        assert_eq!(fitted.kind(), "fitted");

        let table = EncodingStrategy::select(Some(coach_table()), None).unwrap();
        assert_eq!(table.kind(), "static_table");

        assert!(EncodingStrategy::select(None, None).is_err());

        let missing = dir.path().join("absent.json");
        assert!(matches!(
            EncodingStrategy::select(Some(coach_table()), Some(missing.as_path())),
            Err(Error::Artifact { .. })
        ));
    }
}
