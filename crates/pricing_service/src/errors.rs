//! Prediction service error types

use mhd_pricing_core::gbdt::ModelError;
use mhd_pricing_core::PipelineError;
use thiserror::Error;

/// Prediction service errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl From<ModelError> for ServiceError {
    fn from(err: ModelError) -> Self {
        Self::Pipeline(PipelineError::from(err))
    }
}

impl ServiceError {
    /// True when the caller sent a record outside the accepted bounds.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Pipeline(err) if err.is_record_scoped())
    }
}

/// Result type for service operations
pub type Result<T> = std::result::Result<T, ServiceError>;
