//! Prediction interpretation

use crate::classifier::{ClassProbabilities, Classifier};
use serde::{Deserialize, Serialize};
use turnover_core::{Error, FeatureVector, Result, Verdict};

const PROBA_TOLERANCE: f64 = 1e-6;

/// Human-readable names of the two classes; class 1 is always the positive one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictLabels {
    /// Label for class 0
    pub negative: String,

    /// Label for class 1
    pub positive: String,
}

impl Default for VerdictLabels {
    fn default() -> Self {
        Self {
            negative: "stay".to_string(),
            positive: "leave".to_string(),
        }
    }
}

impl VerdictLabels {
    pub fn new(negative: impl Into<String>, positive: impl Into<String>) -> Self {
        Self {
            negative: negative.into(),
            positive: positive.into(),
        }
    }

    /// Label for a class index
    pub fn label(&self, class: u8) -> Option<&str> {
        match class {
            0 => Some(&self.negative),
            1 => Some(&self.positive),
            _ => None,
        }
    }
}

/// Converts classifier output into a [`Verdict`]
#[derive(Debug, Clone, Default)]
pub struct PredictionInterpreter {
    labels: VerdictLabels,
}

impl PredictionInterpreter {
    pub fn new(labels: VerdictLabels) -> Self {
        Self { labels }
    }

    pub fn labels(&self) -> &VerdictLabels {
        &self.labels
    }

    /// Call the classifier and interpret its output
    pub fn interpret(&self, classifier: &dyn Classifier, features: &FeatureVector) -> Result<Verdict> {
        let class = classifier.predict(features)?;
        let label = self.labels.label(class).ok_or_else(|| {
            Error::classifier(format!(
                "{} returned class {}, expected 0 or 1",
                classifier.name(),
                class
            ))
        })?;

        let confidence = if classifier.supports_proba() {
            classifier
                .predict_proba(features)?
                .map(|proba| validate_proba(classifier.name(), proba))
                .transpose()?
                .map(|proba| proba[class as usize])
        } else {
            None
        };

        Ok(Verdict {
            label: label.to_string(),
            predicted_class: class,
            confidence,
        })
    }
}

fn validate_proba(model: &str, proba: ClassProbabilities) -> Result<ClassProbabilities> {
    let in_range = proba
        .iter()
        .all(|p| p.is_finite() && (-PROBA_TOLERANCE..=1.0 + PROBA_TOLERANCE).contains(p));
    let sum = proba[0] + proba[1];

    if !in_range || (sum - 1.0).abs() > PROBA_TOLERANCE {
        return Err(Error::classifier(format!(
            "{} returned an invalid probability distribution {:?}",
            model, proba
        )));
    }

    Ok([proba[0].clamp(0.0, 1.0), proba[1].clamp(0.0, 1.0)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Fixed {
        class: u8,
        proba: Option<ClassProbabilities>,
    }

    impl Classifier for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn feature_names(&self) -> Option<&[String]> {
            None
        }

        fn predict(&self, _features: &FeatureVector) -> Result<u8> {
            Ok(self.class)
        }

        fn supports_proba(&self) -> bool {
            self.proba.is_some()
        }

        fn predict_proba(&self, _features: &FeatureVector) -> Result<Option<ClassProbabilities>> {
            Ok(self.proba)
        }
    }

    fn features() -> FeatureVector {
        FeatureVector::new(Arc::from(vec!["x".to_string()]), vec![1.0]).unwrap()
    }

    #[test]
    fn test_confidence_is_mass_of_predicted_class() {
        let interpreter = PredictionInterpreter::default();
        let model = Fixed {
            class: 1,
            proba: Some([0.2, 0.8]),
        };

        let verdict = interpreter.interpret(&model, &features()).unwrap();
        assert_eq!(verdict.label, "leave");
        assert_eq!(verdict.predicted_class, 1);
        assert_eq!(verdict.confidence, Some(0.8));
    }

    #[test]
    fn test_confidence_absent_without_proba() {
        let interpreter = PredictionInterpreter::new(VerdictLabels::new("Low risk", "High risk"));
        let model = Fixed {
            class: 0,
            proba: None,
        };

        let verdict = interpreter.interpret(&model, &features()).unwrap();
        assert_eq!(verdict.label, "Low risk");
        assert_eq!(verdict.confidence, None);
    }

    #[test]
    fn test_invalid_outputs_rejected() {
        let interpreter = PredictionInterpreter::default();

        let bad_label = Fixed {
            class: 2,
            proba: None,
        };
        assert!(matches!(
            interpreter.interpret(&bad_label, &features()),
            Err(Error::Classifier(_))
        ));

        let bad_proba = Fixed {
            class: 0,
            proba: Some([0.9, 0.9]),
        };
        assert!(matches!(
            interpreter.interpret(&bad_proba, &features()),
            Err(Error::Classifier(_))
        ));
    }
}
