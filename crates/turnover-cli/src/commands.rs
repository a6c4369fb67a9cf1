//! Subcommand handlers

use crate::{Command, OutputFormat};
use anyhow::{Context, Result};
use serde_json::json;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::warn;
use turnover_core::RawRecord;
use turnover_features::{PredictionOutcome, TurnoverPipeline};

/// Exit code when at least one record was rejected
const REJECTED: u8 = 2;

pub fn run(command: &Command, pipeline: &TurnoverPipeline) -> Result<ExitCode> {
    match command {
        Command::Predict { records, format } => predict(pipeline, records, *format),
        Command::Features { record, format } => features(pipeline, record, *format),
        Command::Schema => {
            for (i, column) in pipeline.context().schema().iter().enumerate() {
                println!("{:>3}  {}", i, column);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Check => {
            check(pipeline);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn predict(pipeline: &TurnoverPipeline, records: &[PathBuf], format: OutputFormat) -> Result<ExitCode> {
    let mut rejected = 0usize;

    for path in records {
        let raw = read_record(path)?;
        let outcome = pipeline.predict_outcome(&raw)?;

        match format {
            OutputFormat::Text => match &outcome {
                PredictionOutcome::Verdict(verdict) => println!("{}: {}", path.display(), verdict),
                PredictionOutcome::Rejected { reason, .. } => {
                    println!("{}: rejected: {}", path.display(), reason)
                }
            },
            OutputFormat::Json => {
                let line = json!({ "record": path.display().to_string(), "outcome": outcome });
                println!("{}", serde_json::to_string(&line)?);
            }
        }

        if let PredictionOutcome::Rejected { class, .. } = outcome {
            warn!("Rejected {} ({})", path.display(), class.as_str());
            rejected += 1;
        }
    }

    if rejected > 0 {
        Ok(ExitCode::from(REJECTED))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn features(pipeline: &TurnoverPipeline, path: &Path, format: OutputFormat) -> Result<ExitCode> {
    let raw = read_record(path)?;

    let features = match pipeline.features(&raw) {
        Ok(features) => features,
        Err(e) if e.is_request_local() => {
            println!("{}: rejected: {}", path.display(), e.user_message());
            return Ok(ExitCode::from(REJECTED));
        }
        Err(e) => return Err(e.into()),
    };

    match format {
        OutputFormat::Text => {
            let width = features.columns().iter().map(String::len).max().unwrap_or(0);
            for (column, value) in features.iter() {
                println!("{:<width$}  {}", column, value, width = width);
            }
        }
        OutputFormat::Json => {
            let doc = json!({ "columns": features.columns(), "values": features.values() });
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn check(pipeline: &TurnoverPipeline) {
    let context = pipeline.context();
    let classifier = context.classifier();

    println!("profile:       {}", context.profile_name());
    println!("classifier:    {}", classifier.name());
    println!("columns:       {}", context.schema().len());
    println!("probabilities: {}", classifier.supports_proba());
    println!("encoding:      {}", context.encoding().kind());
    println!("derivation:    {:?}", context.derivation().mode());
    println!("one-hot:       {}", context.aligner().one_hot().join(", "));
    println!("ok");
}

/// Read a record from a YAML or JSON file, or stdin for `-`
pub fn read_record(path: &Path) -> Result<RawRecord> {
    let content = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("cannot read record from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("cannot read record {}", path.display()))?
    };

    // JSON documents are valid YAML
    serde_yaml::from_str(&content).with_context(|| format!("invalid record {}", path.display()))
}
