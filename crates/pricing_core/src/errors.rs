//! Error types for the pricing pipeline

use crate::gbdt::ModelError;
use thiserror::Error;

/// Errors raised by the shared feature pipeline.
///
/// `Validation` rejects a single record and never aborts a batch.
/// `Schema` signals a version skew between fit time and serve time and is
/// fatal for the batch that observed it.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Input violates a stated range or non-null invariant
    #[error("Validation failed for `{field}`: {reason}")]
    Validation { field: String, reason: String },

    /// Required field missing or feature vector length/order mismatch
    #[error("Schema mismatch: {0}")]
    Schema(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Price model error
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

impl PipelineError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn schema(reason: impl Into<String>) -> Self {
        Self::Schema(reason.into())
    }

    /// True when only the offending record should be rejected.
    pub fn is_record_scoped(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
