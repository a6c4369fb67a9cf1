//! Prediction pipeline
//!
//! `raw record -> encode -> derive -> align -> classify -> verdict`
//!
//! Each request is independent and all-or-nothing: either a full verdict is
//! returned or an error explains why none could be produced. The pipeline is
//! cheap to clone and safe to share across threads; the context it wraps is
//! never mutated after startup.

use crate::config::PredictorConfig;
use crate::context::PipelineContext;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;
use turnover_core::{Error, ErrorClass, FeatureVector, RawRecord, Record, Result, Value, Verdict};

/// Encode/derive/align/predict pipeline over an immutable context
#[derive(Clone)]
pub struct TurnoverPipeline {
    context: Arc<PipelineContext>,
}

/// Outcome of a request after boundary error handling
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PredictionOutcome {
    /// A verdict was produced
    Verdict(Verdict),

    /// The request was refused; `reason` is safe to show to the caller
    Rejected {
        #[serde(skip)]
        class: ErrorClass,
        reason: String,
    },
}

impl TurnoverPipeline {
    /// Wrap a built context
    pub fn new(context: PipelineContext) -> Self {
        Self {
            context: Arc::new(context),
        }
    }

    /// Load profile and artifacts, failing fast on any startup error
    pub fn load(config: &PredictorConfig) -> Result<Self> {
        Ok(Self::new(PipelineContext::load(config)?))
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    /// Run the record up to the aligned feature vector
    pub fn features(&self, raw: &RawRecord) -> Result<FeatureVector> {
        self.check_required(raw)?;

        let mut record = Record::from(raw);
        self.context.encoding().encode(&mut record)?;
        self.context.derivation().apply(&mut record)?;
        self.context.aligner().align(record)
    }

    /// Produce a verdict for one record
    pub fn predict(&self, raw: &RawRecord) -> Result<Verdict> {
        let start = Instant::now();

        let result = self.features(raw).and_then(|features| {
            self.context
                .interpreter()
                .interpret(self.context.classifier(), &features)
        });

        metrics::histogram!("turnover_pipeline_latency_us")
            .record(start.elapsed().as_micros() as f64);

        match &result {
            Ok(verdict) => {
                debug!("Prediction: {}", verdict);
                metrics::counter!("turnover_predictions_total", "label" => verdict.label.clone())
                    .increment(1);
            }
            Err(e) => {
                debug!("Prediction failed: {}", e);
                metrics::counter!("turnover_rejections_total", "class" => e.class().as_str())
                    .increment(1);
            }
        }

        result
    }

    /// Predict, turning request-local failures into a rejection.
    ///
    /// Validation, schema, integrity and classifier errors become
    /// [`PredictionOutcome::Rejected`]; startup-class errors stay `Err`.
    pub fn predict_outcome(&self, raw: &RawRecord) -> Result<PredictionOutcome> {
        match self.predict(raw) {
            Ok(verdict) => Ok(PredictionOutcome::Verdict(verdict)),
            Err(e) if e.is_request_local() => Ok(PredictionOutcome::Rejected {
                class: e.class(),
                reason: e.user_message(),
            }),
            Err(e) => Err(e),
        }
    }

    fn check_required(&self, raw: &RawRecord) -> Result<()> {
        for attribute in self.context.raw_attributes() {
            match raw.get(attribute) {
                None | Some(Value::Missing) => return Err(Error::missing_attribute(attribute)),
                Some(_) => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{ClassifierArtifact, LinearModelSpec};
    use crate::profile::Profile;

    fn pipeline() -> TurnoverPipeline {
        let profile = Profile::builtin("turnover").unwrap();
        let mut coefficients = vec![0.0; profile.expected_columns.len()];
        // Lean on stress_level only
        let stress = profile
            .expected_columns
            .iter()
            .position(|c| c == "stress_level")
            .unwrap();
        coefficients[stress] = 1.0;

        let classifier = ClassifierArtifact::LogisticRegression(LinearModelSpec {
            name: None,
            feature_names: Some(profile.expected_columns.clone()),
            coefficients,
            intercept: -6.0,
        })
        .into_classifier("stress-model")
        .unwrap();

        let context = PipelineContext::builder(profile)
            .classifier(classifier)
            .build()
            .unwrap();
        TurnoverPipeline::new(context)
    }

    fn record(anxiety: f64, selfcontrol: f64) -> RawRecord {
        RawRecord::from_pairs([
            ("age", Value::Int(30)),
            ("stag", Value::Int(24)),
            ("coach", Value::from("yes")),
            ("extraversion", Value::Float(5.0)),
            ("independ", Value::Float(5.0)),
            ("selfcontrol", Value::Float(selfcontrol)),
            ("anxiety", Value::Float(anxiety)),
            ("novator", Value::Float(5.0)),
            ("profession", Value::from("worker")),
            ("greywage", Value::Int(30000)),
            ("gender", Value::from("male")),
            ("industry", Value::from("IT")),
            ("way", Value::from("car")),
            ("traffic", Value::from("low")),
            ("head_gender", Value::from("male")),
        ])
    }

    #[test]
    fn test_predict() {
        let pipeline = pipeline();

        let calm = pipeline.predict(&record(5.0, 5.0)).unwrap();
        assert_eq!(calm.label, "stay");
        assert!(calm.confidence.unwrap() > 0.5);

        let stressed = pipeline.predict(&record(10.0, 0.0)).unwrap();
        assert_eq!(stressed.label, "leave");
    }

    #[test]
    fn test_outcome_rejects_unknown_category() {
        let pipeline = pipeline();
        let mut pairs: Vec<(String, Value)> = record(5.0, 5.0)
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        for (name, value) in pairs.iter_mut() {
            if name == "industry" {
                *value = Value::from("Mining");
            }
        }

        let outcome = pipeline
            .predict_outcome(&RawRecord::from_pairs(pairs))
            .unwrap();
        match outcome {
            PredictionOutcome::Rejected { class, reason } => {
                assert_eq!(class, ErrorClass::Validation);
                assert!(reason.contains("industry"));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_attribute_rejected_before_encoding() {
        let pipeline = pipeline();
        let partial = RawRecord::from_pairs([("age", Value::Int(30))]);
        assert!(matches!(
            pipeline.features(&partial),
            Err(Error::MissingAttribute(_))
        ));
    }

    #[test]
    fn test_pipeline_is_shareable() {
        fn assert_send_sync<T: Send + Sync + Clone>() {}
        assert_send_sync::<TurnoverPipeline>();
    }
}
