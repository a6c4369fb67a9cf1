//! Shared fixtures for integration tests
//!
//! Mock classifiers plus ready-made records for the built-in profiles.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use turnover_core::{Error, FeatureVector, RawRecord, Result, Value};
use turnover_features::{
    ClassProbabilities, Classifier, DerivationMode, PipelineContext, Profile, TurnoverPipeline,
};

/// A configurable mock classifier that records what it was called with
pub struct MockClassifier {
    name: String,
    feature_names: Option<Vec<String>>,
    class: u8,
    proba: Option<ClassProbabilities>,
    call_count: AtomicU32,
    last_vector: Mutex<Option<FeatureVector>>,
}

impl MockClassifier {
    /// Create a mock declaring the given schema
    pub fn new(feature_names: Vec<String>) -> Self {
        Self {
            name: "mock".to_string(),
            feature_names: Some(feature_names),
            class: 0,
            proba: None,
            call_count: AtomicU32::new(0),
            last_vector: Mutex::new(None),
        }
    }

    /// Mock declaring the columns the built-in profile was written for
    pub fn for_profile(profile: &str) -> Self {
        Self::new(Profile::builtin(profile).unwrap().expected_columns)
    }

    /// Drop the declared schema
    pub fn without_schema(mut self) -> Self {
        self.feature_names = None;
        self
    }

    /// Set the class this classifier will return
    pub fn with_class(mut self, class: u8) -> Self {
        self.class = class;
        self
    }

    /// Set the probabilities this classifier will return
    pub fn with_proba(mut self, proba: ClassProbabilities) -> Self {
        self.proba = Some(proba);
        self
    }

    /// Get the number of times predict was called
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// The last vector passed to predict
    pub fn last_vector(&self) -> Option<FeatureVector> {
        self.last_vector.lock().unwrap().clone()
    }
}

impl Classifier for MockClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn predict(&self, features: &FeatureVector) -> Result<u8> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self.last_vector.lock().unwrap() = Some(features.clone());
        Ok(self.class)
    }

    fn supports_proba(&self) -> bool {
        self.proba.is_some()
    }

    fn predict_proba(&self, _features: &FeatureVector) -> Result<Option<ClassProbabilities>> {
        Ok(self.proba)
    }
}

/// A classifier that always fails - for testing error paths
pub struct FailingClassifier {
    feature_names: Vec<String>,
}

impl FailingClassifier {
    pub fn for_profile(profile: &str) -> Self {
        Self {
            feature_names: Profile::builtin(profile).unwrap().expected_columns,
        }
    }
}

impl Classifier for FailingClassifier {
    fn name(&self) -> &str {
        "failing"
    }

    fn feature_names(&self) -> Option<&[String]> {
        Some(&self.feature_names)
    }

    fn predict(&self, _features: &FeatureVector) -> Result<u8> {
        Err(Error::classifier("model crashed"))
    }
}

/// Build a pipeline for a built-in profile around the given classifier
pub fn pipeline_with(
    profile: &str,
    classifier: Arc<dyn Classifier>,
    mode: DerivationMode,
) -> TurnoverPipeline {
    let context = PipelineContext::builder(Profile::builtin(profile).unwrap())
        .classifier(classifier)
        .derivation(mode)
        .build()
        .unwrap();
    TurnoverPipeline::new(context)
}

/// Scenario record for the turnover profile, with overrides
pub fn turnover_record(overrides: &[(&str, Value)]) -> RawRecord {
    let mut pairs: Vec<(String, Value)> = vec![
        ("age".into(), Value::Int(30)),
        ("stag".into(), Value::Int(24)),
        ("coach".into(), Value::from("yes")),
        ("extraversion".into(), Value::Float(5.0)),
        ("independ".into(), Value::Float(5.0)),
        ("selfcontrol".into(), Value::Float(5.0)),
        ("anxiety".into(), Value::Float(5.0)),
        ("novator".into(), Value::Float(5.0)),
        ("profession".into(), Value::from("worker")),
        ("greywage".into(), Value::Int(30000)),
        ("gender".into(), Value::from("male")),
        ("industry".into(), Value::from("IT")),
        ("way".into(), Value::from("car")),
        ("traffic".into(), Value::from("low")),
        ("head_gender".into(), Value::from("male")),
    ];
    apply_overrides(&mut pairs, overrides);
    RawRecord::from_pairs(pairs)
}

/// Scenario record for the HR attrition profile, with overrides
pub fn hr_record(overrides: &[(&str, Value)]) -> RawRecord {
    let mut pairs: Vec<(String, Value)> = vec![
        ("Age".into(), Value::Int(35)),
        ("MonthlyIncome".into(), Value::Int(5000)),
        ("YearsAtCompany".into(), Value::Int(5)),
        ("OverTime".into(), Value::from("Yes")),
        ("JobRole".into(), Value::from("Sales Executive")),
        ("Department".into(), Value::from("Sales")),
        ("BusinessTravel".into(), Value::from("Travel_Rarely")),
        ("MaritalStatus".into(), Value::from("Single")),
        ("JobSatisfaction".into(), Value::Int(3)),
        ("EnvironmentSatisfaction".into(), Value::Int(2)),
        ("WorkLifeBalance".into(), Value::Int(3)),
        ("DistanceFromHome".into(), Value::Int(10)),
    ];
    apply_overrides(&mut pairs, overrides);
    RawRecord::from_pairs(pairs)
}

fn apply_overrides(pairs: &mut Vec<(String, Value)>, overrides: &[(&str, Value)]) {
    for (name, value) in overrides {
        match pairs.iter_mut().find(|(k, _)| k == name) {
            Some(entry) => entry.1 = value.clone(),
            None => pairs.push((name.to_string(), value.clone())),
        }
    }
}

/// Assert two floats agree to within `eps`
pub fn assert_close(actual: f64, expected: f64, eps: f64) {
    assert!(
        (actual - expected).abs() < eps,
        "expected {} to be within {} of {}",
        actual,
        eps,
        expected
    );
}
