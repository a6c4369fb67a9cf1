//! Immutable startup context
//!
//! Everything the pipeline needs is loaded once, validated, and frozen here.
//! Loading is fail-fast: a missing or malformed artifact aborts startup
//! instead of failing each request.

use crate::aligner::SchemaAligner;
use crate::artifact::load_classifier;
use crate::classifier::Classifier;
use crate::config::PredictorConfig;
use crate::deriver::{DerivationMode, DerivationPolicy};
use crate::encoder::EncodingStrategy;
use crate::interpreter::PredictionInterpreter;
use crate::profile::Profile;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};
use turnover_core::{ClassifierSchema, Error, Result};

/// Loaded classifier, strategies and schema for one deployment
pub struct PipelineContext {
    profile_name: String,
    raw_attributes: Vec<String>,
    classifier: Arc<dyn Classifier>,
    encoding: EncodingStrategy,
    derivation: DerivationPolicy,
    aligner: SchemaAligner,
    interpreter: PredictionInterpreter,
}

impl PipelineContext {
    /// Start building a context for a profile
    pub fn builder(profile: Profile) -> PipelineContextBuilder {
        PipelineContextBuilder {
            profile,
            classifier: None,
            encoding: None,
            derivation: DerivationMode::default(),
        }
    }

    /// Load profile and artifacts named by the configuration
    pub fn load(config: &PredictorConfig) -> Result<Self> {
        info!("Loading predictor with profile '{}'", config.profile);

        let profile = Profile::resolve(&config.profile)?;
        let classifier = load_classifier(&config.classifier)?;
        let encoding = EncodingStrategy::select(profile.encoding.clone(), config.encoders.as_deref())?;

        Self::builder(profile)
            .classifier(classifier)
            .encoding(encoding)
            .derivation(config.derivation)
            .build()
    }

    pub fn profile_name(&self) -> &str {
        &self.profile_name
    }

    /// Attributes each record must supply
    pub fn raw_attributes(&self) -> &[String] {
        &self.raw_attributes
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn encoding(&self) -> &EncodingStrategy {
        &self.encoding
    }

    pub fn derivation(&self) -> &DerivationPolicy {
        &self.derivation
    }

    pub fn aligner(&self) -> &SchemaAligner {
        &self.aligner
    }

    pub fn interpreter(&self) -> &PredictionInterpreter {
        &self.interpreter
    }

    /// Classifier input schema
    pub fn schema(&self) -> &ClassifierSchema {
        self.aligner.schema()
    }
}

/// Builder for [`PipelineContext`]
pub struct PipelineContextBuilder {
    profile: Profile,
    classifier: Option<Arc<dyn Classifier>>,
    encoding: Option<EncodingStrategy>,
    derivation: DerivationMode,
}

impl PipelineContextBuilder {
    /// Set the classifier
    pub fn classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Override the encoding strategy (defaults to the profile's static table)
    pub fn encoding(mut self, encoding: EncodingStrategy) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Set the derivation mode
    pub fn derivation(mut self, mode: DerivationMode) -> Self {
        self.derivation = mode;
        self
    }

    /// Validate everything and freeze the context
    pub fn build(self) -> Result<PipelineContext> {
        let profile = self.profile;
        let classifier = self
            .classifier
            .ok_or_else(|| Error::config("pipeline context requires a classifier"))?;

        let encoding = match self.encoding {
            Some(encoding) => encoding,
            None => EncodingStrategy::select(profile.encoding.clone(), None)?,
        };

        let raw: HashSet<&str> = profile.raw_attributes.iter().map(String::as_str).collect();
        for attribute in encoding.attributes() {
            if !raw.contains(attribute) {
                return Err(Error::config(format!(
                    "encoder covers '{}' which profile '{}' does not collect",
                    attribute, profile.name
                )));
            }
            if profile.one_hot.iter().any(|a| a == attribute) {
                return Err(Error::config(format!(
                    "'{}' is both label-encoded and one-hot expanded",
                    attribute
                )));
            }
        }

        // A fitted artifact replaces the static table, so it must cover all of it
        if let (EncodingStrategy::Fitted(encoders), Some(table)) = (&encoding, &profile.encoding) {
            let uncovered: Vec<&str> = table
                .attributes()
                .filter(|attribute| encoders.get(attribute).is_none())
                .collect();
            if !uncovered.is_empty() {
                return Err(Error::config(format!(
                    "encoder artifact does not cover categorical attributes of profile '{}': {}",
                    profile.name,
                    uncovered.join(", ")
                )));
            }
        }

        let derivation = DerivationPolicy::build(
            &profile.derivation.resolve_categories(&encoding)?,
            self.derivation,
        )?;
        let aligner = SchemaAligner::from_classifier(classifier.as_ref(), profile.one_hot.clone())?;

        check_schema_coverage(&profile, aligner.schema());

        info!(
            "Pipeline '{}' ready: classifier '{}', {} columns, encoding={}, derivation={:?}, probabilities={}",
            profile.name,
            classifier.name(),
            aligner.schema().len(),
            encoding.kind(),
            derivation.mode(),
            classifier.supports_proba()
        );

        Ok(PipelineContext {
            profile_name: profile.name,
            raw_attributes: profile.raw_attributes,
            interpreter: PredictionInterpreter::new(profile.labels),
            classifier,
            encoding,
            derivation,
            aligner,
        })
    }
}

/// Warn about schema columns the profile can never produce
fn check_schema_coverage(profile: &Profile, schema: &ClassifierSchema) {
    if !profile.expected_columns.is_empty() && profile.expected_columns[..] != schema[..] {
        warn!(
            "Classifier schema differs from the columns profile '{}' was written for",
            profile.name
        );
    }

    let producible: HashSet<&str> = profile
        .raw_attributes
        .iter()
        .map(String::as_str)
        .chain(profile.derivation.rules.iter().map(|r| r.name()))
        .collect();

    let unreachable: Vec<&str> = schema
        .iter()
        .map(String::as_str)
        .filter(|column| !producible.contains(column))
        .filter(|column| {
            !profile
                .one_hot
                .iter()
                .any(|a| column.strip_prefix(a.as_str()).is_some_and(|rest| rest.starts_with('_')))
        })
        .collect();

    if !unreachable.is_empty() {
        warn!(
            "{} schema columns can only ever be zero-filled: {}",
            unreachable.len(),
            unreachable.join(", ")
        );
    }
}
