//! Turnover Core
//!
//! Types shared across the turnover predictor crates.
//!
//! This crate provides:
//! - Raw records, working records and attribute values
//! - The schema-ordered feature vector handed to classifiers
//! - The verdict returned to callers
//! - Error types, error classes and result handling

pub mod error;
pub mod types;

pub use error::{Error, ErrorClass, Result};
pub use types::{ClassifierSchema, FeatureVector, RawRecord, Record, Value, Verdict};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, ErrorClass, Result};
    pub use crate::types::{FeatureVector, RawRecord, Record, Value, Verdict};
}
