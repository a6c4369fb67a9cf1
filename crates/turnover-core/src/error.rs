//! Error types for the turnover predictor

use std::path::PathBuf;

/// Result type alias using the predictor's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for pipeline operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration errors (bad profile, missing schema, invalid rule set)
    #[error("configuration error: {0}")]
    Config(String),

    /// A persisted artifact could not be read or is malformed
    #[error("artifact error ({}): {reason}", .path.display())]
    Artifact { path: PathBuf, reason: String },

    /// Categorical value outside the known vocabulary
    #[error("unknown category '{value}' for attribute '{attribute}'")]
    UnknownCategory { attribute: String, value: String },

    /// A required attribute is absent from the record
    #[error("missing attribute '{0}'")]
    MissingAttribute(String),

    /// An attribute that must be numeric holds text
    #[error("attribute '{attribute}' is not numeric")]
    NonNumeric { attribute: String },

    /// The classifier schema cannot be satisfied by the aligned record
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// An aligned column still holds a null/undefined value
    #[error("column '{column}' has no value after alignment")]
    MissingValue { column: String },

    /// Classifier execution errors
    #[error("classifier error: {0}")]
    Classifier(String),

    /// IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML errors
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Severity class of an error, used at the pipeline boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Artifacts or configuration are unusable; retrying cannot help
    Startup,
    /// The submitted record is invalid
    Validation,
    /// Drift between the deriver/aligner and the trained artifact
    Schema,
    /// A null value survived alignment
    Integrity,
    /// The classifier call itself failed
    Classifier,
}

impl ErrorClass {
    /// Stable lowercase name, used as a metrics label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Validation => "validation",
            Self::Schema => "schema",
            Self::Integrity => "integrity",
            Self::Classifier => "classifier",
        }
    }
}

impl Error {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new artifact error
    pub fn artifact(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Artifact {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new unknown-category error
    pub fn unknown_category(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self::UnknownCategory {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Create a new missing-attribute error
    pub fn missing_attribute(attribute: impl Into<String>) -> Self {
        Self::MissingAttribute(attribute.into())
    }

    /// Create a new non-numeric error
    pub fn non_numeric(attribute: impl Into<String>) -> Self {
        Self::NonNumeric {
            attribute: attribute.into(),
        }
    }

    /// Create a new schema mismatch error
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::SchemaMismatch(msg.into())
    }

    /// Create a new missing-value error
    pub fn missing_value(column: impl Into<String>) -> Self {
        Self::MissingValue {
            column: column.into(),
        }
    }

    /// Create a new classifier error
    pub fn classifier(msg: impl Into<String>) -> Self {
        Self::Classifier(msg.into())
    }

    /// Classify this error for boundary handling
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Config(_)
            | Self::Artifact { .. }
            | Self::Io(_)
            | Self::Serialization(_)
            | Self::Yaml(_) => ErrorClass::Startup,
            Self::UnknownCategory { .. } | Self::MissingAttribute(_) | Self::NonNumeric { .. } => {
                ErrorClass::Validation
            }
            Self::SchemaMismatch(_) => ErrorClass::Schema,
            Self::MissingValue { .. } => ErrorClass::Integrity,
            Self::Classifier(_) => ErrorClass::Classifier,
        }
    }

    /// Whether the error concerns only the current request
    pub fn is_request_local(&self) -> bool {
        !matches!(self.class(), ErrorClass::Startup)
    }

    /// Message suitable for showing to whoever filled in the record
    pub fn user_message(&self) -> String {
        match self {
            Self::UnknownCategory { attribute, value } => format!(
                "'{}' is not a recognised value for {}; choose one of the known options",
                value, attribute
            ),
            Self::MissingAttribute(attribute) => format!("{} is required", attribute),
            Self::NonNumeric { attribute } => format!("{} must be a number", attribute),
            Self::MissingValue { column } => format!(
                "feature '{}' could not be computed from the submitted values",
                column
            ),
            Self::SchemaMismatch(msg) => {
                format!("the model does not match this form's features: {}", msg)
            }
            other => format!("prediction failed: {}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert_eq!(Error::config("x").class(), ErrorClass::Startup);
        assert_eq!(
            Error::unknown_category("coach", "sometimes").class(),
            ErrorClass::Validation
        );
        assert_eq!(Error::schema("collision").class(), ErrorClass::Schema);
        assert_eq!(Error::missing_value("AgeGroup").class(), ErrorClass::Integrity);
        assert_eq!(Error::classifier("bad label").class(), ErrorClass::Classifier);
    }

    #[test]
    fn test_user_message_names_attribute() {
        let err = Error::unknown_category("industry", "Retail");
        let msg = err.user_message();
        assert!(msg.contains("industry"));
        assert!(msg.contains("Retail"));
        assert!(err.is_request_local());
        assert!(!Error::artifact("model.json", "truncated").is_request_local());
    }
}
