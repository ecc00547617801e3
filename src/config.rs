//! Configuration management
//!
//! Settings come from an optional TOML file, overridden by `REVENUE__<SECTION>__<KEY>`
//! environment variables. Every section has defaults, so an empty file is valid.

use serde::{Deserialize, Serialize};

use crate::error::{Result, RevenueError};
use crate::features::FeatureConfig;
use crate::forecast::ForecasterConfig;
use crate::pricing::PricingConfig;

pub const ENV_PREFIX: &str = "REVENUE";

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub features: FeatureConfig,
    pub forecaster: ForecasterConfig,
    pub pricing: PricingConfig,
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load from `path` (missing file allowed) plus `REVENUE__*` environment overrides
    pub fn load(path: &str) -> Result<Self> {
        Self::load_with_env(path, environment())
    }

    pub(crate) fn load_with_env(path: &str, env: config::Environment) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(env)
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engines cannot run with
    pub fn validate(&self) -> Result<()> {
        self.features.validate()?;
        if self.forecaster.folds == 0 {
            return Err(RevenueError::Config("forecaster.folds must be at least 1".to_string()));
        }
        if self.forecaster.forest.n_trees == 0 {
            return Err(RevenueError::Config(
                "forecaster.forest.n_trees must be at least 1".to_string(),
            ));
        }
        if !self.forecaster.interval_z.is_finite() || self.forecaster.interval_z < 0.0 {
            return Err(RevenueError::Config(format!(
                "forecaster.interval_z must be a finite non-negative number, got {}",
                self.forecaster.interval_z
            )));
        }
        self.pricing.validate()
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}
