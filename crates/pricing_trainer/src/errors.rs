use mhd_pricing_core::gbdt::ModelError;
use mhd_pricing_core::PipelineError;
use thiserror::Error;

/// Errors returned by the offline pipeline.
#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("training error: {0}")]
    Training(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl From<csv::Error> for TrainerError {
    fn from(err: csv::Error) -> Self {
        Self::Dataset(err.to_string())
    }
}

impl From<std::io::Error> for TrainerError {
    fn from(err: std::io::Error) -> Self {
        Self::Pipeline(PipelineError::Io(err))
    }
}

impl From<serde_json::Error> for TrainerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Pipeline(PipelineError::Serialization(err))
    }
}

impl From<ModelError> for TrainerError {
    fn from(err: ModelError) -> Self {
        Self::Pipeline(PipelineError::Model(err))
    }
}

pub type Result<T> = std::result::Result<T, TrainerError>;
