//! Configuration loading with command-line overrides

use crate::Cli;
use anyhow::Result;
use tracing::debug;
use turnover_features::PredictorConfig;

/// Load the config file (or defaults when absent) and apply CLI overrides
pub fn load(cli: &Cli) -> Result<PredictorConfig> {
    if !cli.config.exists() {
        debug!("No config at {}, using defaults", cli.config.display());
    }
    let mut config = PredictorConfig::load_or_default(&cli.config)?;

    if let Some(profile) = &cli.profile {
        config.profile = profile.clone();
    }

    if let Some(classifier) = &cli.classifier {
        config.classifier = classifier.clone();
    }

    if let Some(encoders) = &cli.encoders {
        config.encoders = Some(encoders.clone());
    }

    if let Some(derivation) = cli.derivation {
        config.derivation = derivation.into();
    }

    Ok(config)
}
