//! Turnover CLI
//!
//! Loads a profile, a classifier artifact and optional fitted encoders once,
//! then predicts turnover risk for records read from YAML or JSON files.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use turnover_features::{DerivationMode, TurnoverPipeline};

mod commands;
mod config;

#[derive(Parser, Debug)]
#[command(name = "turnover")]
#[command(about = "Employee turnover risk predictor", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "TURNOVER_CONFIG", default_value = "turnover.yaml", global = true)]
    config: PathBuf,

    /// Built-in profile name or profile file
    #[arg(short, long, env = "TURNOVER_PROFILE", global = true)]
    profile: Option<String>,

    /// Classifier artifact path
    #[arg(long, env = "TURNOVER_CLASSIFIER", global = true)]
    classifier: Option<PathBuf>,

    /// Fitted-encoder artifact path
    #[arg(long, env = "TURNOVER_ENCODERS", global = true)]
    encoders: Option<PathBuf>,

    /// How engineered features are produced
    #[arg(long, value_enum, env = "TURNOVER_DERIVATION", global = true)]
    derivation: Option<DerivationArg>,

    /// Print a Prometheus snapshot of pipeline metrics to stderr on exit
    #[arg(long, global = true)]
    metrics: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Predict turnover risk for one or more records
    Predict {
        /// Record file (YAML or JSON, `-` for stdin); repeatable
        #[arg(short, long = "record", required = true)]
        records: Vec<PathBuf>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Print the aligned feature vector for a record
    Features {
        /// Record file (YAML or JSON, `-` for stdin)
        #[arg(short, long)]
        record: PathBuf,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Print the columns the classifier requires, in order
    Schema,

    /// Load every artifact and report the resolved pipeline
    Check,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum DerivationArg {
    Compute,
    Backfill,
}

impl From<DerivationArg> for DerivationMode {
    fn from(arg: DerivationArg) -> Self {
        match arg {
            DerivationArg::Compute => DerivationMode::Compute,
            DerivationArg::Backfill => DerivationMode::Backfill,
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);
    let metrics_handle = if cli.metrics {
        Some(init_metrics()?)
    } else {
        None
    };

    let config = config::load(&cli)?;
    info!(
        "Profile: {}, classifier: {}",
        config.profile,
        config.classifier.display()
    );

    let pipeline = TurnoverPipeline::load(&config)
        .with_context(|| format!("failed to start predictor for profile '{}'", config.profile))?;

    let code = commands::run(&cli.command, &pipeline)?;

    if let Some(handle) = metrics_handle {
        eprintln!("{}", handle.render());
    }

    Ok(code)
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("turnover=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("turnover=info"))
    };

    // Results go to stdout; logs stay on stderr
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Install the Prometheus recorder and return a handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!(
        "turnover_predictions_total",
        "Total number of verdicts produced, by label"
    );
    metrics::describe_counter!(
        "turnover_rejections_total",
        "Total number of rejected requests, by error class"
    );
    metrics::describe_histogram!(
        "turnover_pipeline_latency_us",
        metrics::Unit::Microseconds,
        "Encode-to-verdict latency in microseconds"
    );

    Ok(handle)
}
