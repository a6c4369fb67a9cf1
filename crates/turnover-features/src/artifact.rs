//! Persisted classifier artifacts
//!
//! Trained models are exported to JSON documents tagged by `kind`. Three
//! model families are understood:
//! - `logistic_regression`: linear decision function with probabilities
//! - `linear_svm`: linear decision function, labels only
//! - `random_forest`: averaged decision trees with leaf class counts
//!
//! Artifacts are read once at startup; any malformed document is a startup
//! error.

use crate::classifier::{check_columns, sigmoid, ClassProbabilities, Classifier};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use turnover_core::{Error, FeatureVector, Result};

/// Serialized classifier, tagged by model family
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierArtifact {
    LogisticRegression(LinearModelSpec),
    LinearSvm(LinearModelSpec),
    RandomForest(ForestSpec),
}

/// Weights of a linear model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModelSpec {
    /// Model name
    #[serde(default)]
    pub name: Option<String>,

    /// Declared input columns, in training order
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,

    /// One coefficient per input column
    pub coefficients: Vec<f64>,

    /// Bias term
    #[serde(default)]
    pub intercept: f64,
}

/// Trees of a random forest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestSpec {
    /// Model name
    #[serde(default)]
    pub name: Option<String>,

    /// Declared input columns, in training order
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,

    /// Estimators
    pub trees: Vec<TreeSpec>,
}

/// A single decision tree; node 0 is the root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeSpec {
    pub nodes: Vec<TreeNode>,
}

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TreeNode {
    /// `x[feature] <= threshold` goes left
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },

    /// Training sample counts (or weights) per class
    Leaf { value: [f64; 2] },
}

impl ClassifierArtifact {
    /// Parse an artifact from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read an artifact file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::artifact(path, format!("cannot read: {}", e)))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::artifact(path, format!("malformed classifier: {}", e)))
    }

    /// Validate the artifact and build the runtime classifier
    pub fn into_classifier(self, default_name: &str) -> Result<Arc<dyn Classifier>> {
        let name_or = |name: Option<String>| name.unwrap_or_else(|| default_name.to_string());

        let classifier: Arc<dyn Classifier> = match self {
            Self::LogisticRegression(spec) => {
                spec.validate()?;
                Arc::new(LogisticRegression {
                    name: name_or(spec.name),
                    feature_names: spec.feature_names,
                    coefficients: spec.coefficients,
                    intercept: spec.intercept,
                })
            }
            Self::LinearSvm(spec) => {
                spec.validate()?;
                Arc::new(LinearSvm {
                    name: name_or(spec.name),
                    feature_names: spec.feature_names,
                    coefficients: spec.coefficients,
                    intercept: spec.intercept,
                })
            }
            Self::RandomForest(spec) => {
                spec.validate()?;
                Arc::new(RandomForest {
                    name: name_or(spec.name),
                    feature_names: spec.feature_names,
                    trees: spec.trees,
                })
            }
        };

        Ok(classifier)
    }
}

/// Load a classifier artifact from disk
pub fn load_classifier(path: impl AsRef<Path>) -> Result<Arc<dyn Classifier>> {
    let path = path.as_ref();
    let artifact = ClassifierArtifact::from_file(path)?;
    let default_name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("classifier");

    let classifier = artifact
        .into_classifier(default_name)
        .map_err(|e| Error::artifact(path, e.to_string()))?;

    info!(
        "Loaded classifier '{}' from {} ({} declared columns)",
        classifier.name(),
        path.display(),
        classifier.feature_names().map_or(0, |names| names.len())
    );

    Ok(classifier)
}

impl LinearModelSpec {
    fn validate(&self) -> Result<()> {
        if self.coefficients.is_empty() {
            return Err(Error::config("linear model has no coefficients"));
        }
        if let Some(names) = &self.feature_names {
            if names.len() != self.coefficients.len() {
                return Err(Error::config(format!(
                    "{} feature names but {} coefficients",
                    names.len(),
                    self.coefficients.len()
                )));
            }
        }
        Ok(())
    }
}

impl ForestSpec {
    fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            return Err(Error::config("random forest has no trees"));
        }

        let n_features = self.feature_names.as_ref().map(Vec::len);

        for (t, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(Error::config(format!("tree {} has no nodes", t)));
            }
            for (i, node) in tree.nodes.iter().enumerate() {
                match node {
                    TreeNode::Split {
                        feature,
                        left,
                        right,
                        ..
                    } => {
                        if n_features.is_some_and(|n| *feature >= n) {
                            return Err(Error::config(format!(
                                "tree {} node {} splits on feature {} out of range",
                                t, i, feature
                            )));
                        }
                        // Children must come after their parent so traversal terminates
                        for child in [*left, *right] {
                            if child <= i || child >= tree.nodes.len() {
                                return Err(Error::config(format!(
                                    "tree {} node {} has invalid child {}",
                                    t, i, child
                                )));
                            }
                        }
                    }
                    TreeNode::Leaf { value } => {
                        if value.iter().any(|v| *v < 0.0) || value.iter().sum::<f64>() <= 0.0 {
                            return Err(Error::config(format!(
                                "tree {} leaf {} has no class mass",
                                t, i
                            )));
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

fn decision_function(coefficients: &[f64], intercept: f64, features: &FeatureVector) -> Result<f64> {
    if coefficients.len() != features.len() {
        return Err(Error::schema(format!(
            "model has {} coefficients, vector has {} values",
            coefficients.len(),
            features.len()
        )));
    }

    Ok(coefficients
        .iter()
        .zip(features.values())
        .map(|(w, x)| w * x)
        .sum::<f64>()
        + intercept)
}

/// Binary logistic regression
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    name: String,
    feature_names: Option<Vec<String>>,
    coefficients: Vec<f64>,
    intercept: f64,
}

impl Classifier for LogisticRegression {
    fn name(&self) -> &str {
        &self.name
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn predict(&self, features: &FeatureVector) -> Result<u8> {
        check_columns(&self.name, self.feature_names(), features)?;
        let z = decision_function(&self.coefficients, self.intercept, features)?;
        Ok((z > 0.0) as u8)
    }

    fn supports_proba(&self) -> bool {
        true
    }

    fn predict_proba(&self, features: &FeatureVector) -> Result<Option<ClassProbabilities>> {
        check_columns(&self.name, self.feature_names(), features)?;
        let p = sigmoid(decision_function(&self.coefficients, self.intercept, features)?);
        Ok(Some([1.0 - p, p]))
    }
}

/// Linear support vector machine without probability calibration
#[derive(Debug, Clone)]
pub struct LinearSvm {
    name: String,
    feature_names: Option<Vec<String>>,
    coefficients: Vec<f64>,
    intercept: f64,
}

impl Classifier for LinearSvm {
    fn name(&self) -> &str {
        &self.name
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn predict(&self, features: &FeatureVector) -> Result<u8> {
        check_columns(&self.name, self.feature_names(), features)?;
        let z = decision_function(&self.coefficients, self.intercept, features)?;
        Ok((z > 0.0) as u8)
    }
}

/// Random forest averaging per-tree class distributions
#[derive(Debug, Clone)]
pub struct RandomForest {
    name: String,
    feature_names: Option<Vec<String>>,
    trees: Vec<TreeSpec>,
}

impl RandomForest {
    fn tree_distribution(&self, tree: &TreeSpec, x: &[f64]) -> Result<ClassProbabilities> {
        let mut idx = 0;
        loop {
            match &tree.nodes[idx] {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = x.get(*feature).ok_or_else(|| {
                        Error::classifier(format!(
                            "{}: feature index {} beyond {} inputs",
                            self.name,
                            feature,
                            x.len()
                        ))
                    })?;
                    idx = if *value <= *threshold { *left } else { *right };
                }
                TreeNode::Leaf { value } => {
                    let total = value[0] + value[1];
                    return Ok([value[0] / total, value[1] / total]);
                }
            }
        }
    }

    fn distribution(&self, features: &FeatureVector) -> Result<ClassProbabilities> {
        check_columns(&self.name, self.feature_names(), features)?;

        let mut sum = [0.0, 0.0];
        for tree in &self.trees {
            let [p0, p1] = self.tree_distribution(tree, features.values())?;
            sum[0] += p0;
            sum[1] += p1;
        }

        let n = self.trees.len() as f64;
        Ok([sum[0] / n, sum[1] / n])
    }
}

impl Classifier for RandomForest {
    fn name(&self) -> &str {
        &self.name
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn predict(&self, features: &FeatureVector) -> Result<u8> {
        let [p0, p1] = self.distribution(features)?;
        Ok((p1 > p0) as u8)
    }

    fn supports_proba(&self) -> bool {
        true
    }

    fn predict_proba(&self, features: &FeatureVector) -> Result<Option<ClassProbabilities>> {
        self.distribution(features).map(Some)
    }
}
