//! Predictor configuration

use crate::deriver::DerivationMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use turnover_core::{Error, Result};

/// Which profile and artifacts a predictor loads at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorConfig {
    /// Built-in profile name or path to a profile YAML file
    #[serde(default = "default_profile")]
    pub profile: String,

    /// Classifier artifact path
    #[serde(default = "default_classifier")]
    pub classifier: PathBuf,

    /// Fitted-encoder artifact path; selects the fitted-encoder strategy
    #[serde(default)]
    pub encoders: Option<PathBuf>,

    /// Compute engineered features or backfill them with defaults
    #[serde(default)]
    pub derivation: DerivationMode,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            classifier: default_classifier(),
            encoders: None,
            derivation: DerivationMode::default(),
        }
    }
}

impl PredictorConfig {
    /// Create a configuration for a profile and classifier artifact
    pub fn new(profile: impl Into<String>, classifier: impl Into<PathBuf>) -> Self {
        Self {
            profile: profile.into(),
            classifier: classifier.into(),
            ..Default::default()
        }
    }

    /// Use a fitted-encoder artifact
    pub fn with_encoders(mut self, path: impl Into<PathBuf>) -> Self {
        self.encoders = Some(path.into());
        self
    }

    /// Set the derivation mode
    pub fn with_derivation(mut self, mode: DerivationMode) -> Self {
        self.derivation = mode;
        self
    }

    /// Load from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read config {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
            .map_err(|e| Error::config(format!("invalid config {}: {}", path.display(), e)))
    }

    /// Load from file when it exists, otherwise use defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }
}

fn default_profile() -> String {
    "turnover".to_string()
}

fn default_classifier() -> PathBuf {
    PathBuf::from("./models/turnover_classifier.json")
}
