//! Error types for forecasting and pricing

use thiserror::Error;

/// Errors reported by the forecaster, the pricing engine and their collaborators
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RevenueError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Unknown room type: {0}")]
    UnknownCategory(String),

    #[error("Invalid forecast horizon: {0} days (must be positive)")]
    InvalidHorizon(i64),

    #[error("Invalid price policy: {0}")]
    InvalidPolicy(String),

    #[error("Forecaster is not trained")]
    NotTrained,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for RevenueError {
    fn from(e: serde_json::Error) -> Self {
        RevenueError::Serialization(e.to_string())
    }
}

impl From<config::ConfigError> for RevenueError {
    fn from(e: config::ConfigError) -> Self {
        RevenueError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RevenueError>;
