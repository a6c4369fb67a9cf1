//! Pipeline profiles
//!
//! A profile is the frozen per-deployment contract between the form and the
//! trained classifier: which raw attributes are collected, how categories are
//! coded, which features are engineered, and how classes are named.

use crate::deriver::DerivationSpec;
use crate::encoder::EncodingTable;
use crate::interpreter::VerdictLabels;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use turnover_core::{Error, Result};

const TURNOVER_PROFILE: &str = include_str!("../profiles/turnover.yaml");
const HR_ATTRITION_PROFILE: &str = include_str!("../profiles/hr_attrition.yaml");

/// Frozen encoding and derivation contract for one deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Profile name
    pub name: String,

    /// Profile description
    #[serde(default)]
    pub description: Option<String>,

    /// Attributes every record must carry
    pub raw_attributes: Vec<String>,

    /// Static encoding table (absent when only fitted encoders are used)
    #[serde(default)]
    pub encoding: Option<EncodingTable>,

    /// Nominal attributes expanded into dummy columns
    #[serde(default)]
    pub one_hot: Vec<String>,

    /// Engineered features
    #[serde(default)]
    pub derivation: DerivationSpec,

    /// Class names
    #[serde(default)]
    pub labels: VerdictLabels,

    /// Schema the profile was written against, for documentation and checks
    #[serde(default)]
    pub expected_columns: Vec<String>,
}

impl Profile {
    /// Names of the embedded profiles
    pub fn builtin_names() -> &'static [&'static str] {
        &["turnover", "hr_attrition"]
    }

    /// Load an embedded profile by name
    pub fn builtin(name: &str) -> Result<Self> {
        let yaml = match name {
            "turnover" => TURNOVER_PROFILE,
            "hr_attrition" => HR_ATTRITION_PROFILE,
            other => {
                return Err(Error::config(format!(
                    "unknown built-in profile '{}' (available: {})",
                    other,
                    Self::builtin_names().join(", ")
                )))
            }
        };
        Self::from_yaml(yaml)
    }

    /// Parse and validate a profile from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let profile: Self = serde_yaml::from_str(yaml)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Load a profile file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read profile {}: {}", path.display(), e)))?;
        Self::from_yaml(&content)
            .map_err(|e| Error::config(format!("invalid profile {}: {}", path.display(), e)))
    }

    /// Resolve a built-in name or a path to a profile file
    pub fn resolve(name_or_path: &str) -> Result<Self> {
        if Self::builtin_names().contains(&name_or_path) {
            Self::builtin(name_or_path)
        } else {
            Self::from_file(name_or_path)
        }
    }

    fn validate(&self) -> Result<()> {
        if self.raw_attributes.is_empty() {
            return Err(Error::config(format!(
                "profile '{}' lists no raw attributes",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for attribute in &self.raw_attributes {
            if !seen.insert(attribute.as_str()) {
                return Err(Error::config(format!(
                    "profile '{}' lists raw attribute '{}' twice",
                    self.name, attribute
                )));
            }
        }

        let encoded: Vec<&str> = self
            .encoding
            .iter()
            .flat_map(|table| table.attributes())
            .collect();
        for attribute in encoded.iter().copied().chain(self.one_hot.iter().map(String::as_str)) {
            if !seen.contains(attribute) {
                return Err(Error::config(format!(
                    "profile '{}' encodes '{}' which is not a raw attribute",
                    self.name, attribute
                )));
            }
        }

        if let Some(both) = self.one_hot.iter().find(|a| encoded.contains(&a.as_str())) {
            return Err(Error::config(format!(
                "profile '{}' both encodes and one-hot expands '{}'",
                self.name, both
            )));
        }

        Ok(())
    }
}
