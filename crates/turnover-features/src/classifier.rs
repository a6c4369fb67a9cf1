//! Classifier trait and probability helpers

use turnover_core::{Error, FeatureVector, Result};

/// Two-class probability distribution `[p(class 0), p(class 1)]`
pub type ClassProbabilities = [f64; 2];

/// Trait for trained binary classifiers consumed as black boxes
pub trait Classifier: Send + Sync {
    /// Get the classifier name
    fn name(&self) -> &str;

    /// Ordered input columns declared by the trained artifact, if any
    fn feature_names(&self) -> Option<&[String]>;

    /// Predict the class label (0 or 1)
    fn predict(&self, features: &FeatureVector) -> Result<u8>;

    /// Whether `predict_proba` yields a distribution
    fn supports_proba(&self) -> bool {
        false
    }

    /// Class probabilities, `None` when the model cannot estimate them
    fn predict_proba(&self, _features: &FeatureVector) -> Result<Option<ClassProbabilities>> {
        Ok(None)
    }
}

/// Verify that a vector was aligned to the given feature names
pub fn check_columns(model: &str, expected: Option<&[String]>, features: &FeatureVector) -> Result<()> {
    let Some(expected) = expected else {
        return Ok(());
    };

    if expected != features.columns() {
        let first_diff = expected
            .iter()
            .zip(features.columns())
            .position(|(a, b)| a != b)
            .unwrap_or_else(|| expected.len().min(features.len()));
        return Err(Error::schema(format!(
            "{} expects {} columns, got {} (first difference at position {})",
            model,
            expected.len(),
            features.len(),
            first_diff
        )));
    }

    Ok(())
}

/// Logistic function
pub(crate) fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
