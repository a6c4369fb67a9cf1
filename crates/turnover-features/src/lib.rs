//! Turnover Features
//!
//! Turns raw employee attributes into the exact feature vector a trained
//! classifier expects, then interprets the classifier's output as a verdict.
//!
//! The pipeline has four stages, each fixed at startup:
//! - Category encoding: static table or fitted label encoders
//! - Feature derivation: declarative rules, or backfilled defaults
//! - Schema alignment: one-hot expansion, zero-fill, pruning and ordering
//! - Prediction interpretation: label plus optional confidence
//!
//! Trained classifiers are opaque; they are only called through the
//! [`Classifier`] trait.

pub mod aligner;
pub mod artifact;
pub mod classifier;
pub mod config;
pub mod context;
pub mod deriver;
pub mod encoder;
pub mod interpreter;
pub mod pipeline;
pub mod profile;

pub use aligner::SchemaAligner;
pub use artifact::{load_classifier, ClassifierArtifact};
pub use classifier::{ClassProbabilities, Classifier};
pub use config::PredictorConfig;
pub use context::{PipelineContext, PipelineContextBuilder};
pub use deriver::{
    BinClosed, Comparison, DerivationMode, DerivationPolicy, DerivationRule, DerivationSpec,
    FeatureDeriver, IndicatorTarget, Operand,
};
pub use encoder::{EncodingStrategy, EncodingTable, FittedEncoder, FittedEncoders};
pub use interpreter::{PredictionInterpreter, VerdictLabels};
pub use pipeline::{PredictionOutcome, TurnoverPipeline};
pub use profile::Profile;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classifier::Classifier;
    pub use crate::config::PredictorConfig;
    pub use crate::context::PipelineContext;
    pub use crate::pipeline::{PredictionOutcome, TurnoverPipeline};
    pub use crate::profile::Profile;
    pub use turnover_core::prelude::*;
}
