//! Training artifacts handed from the fit pass to the serving process

use crate::encoding::{CategoricalEncoder, EncodingTable};
use crate::errors::{PipelineError, Result};
use crate::schema::{verify_columns, FEATURE_COLUMNS, REFERENCE_YEAR, SCHEMA_VERSION, TARGET_COLUMN};
use crate::serde_canon::{hash_canonical_hex, to_canonical_json_pretty};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

pub const FEATURE_INFO_FILE: &str = "feature_info.json";
pub const TRAIN_FILE: &str = "train.csv";
pub const TEST_FILE: &str = "test.csv";
pub const MODEL_FILE: &str = "model.json";
pub const MODEL_HASH_FILE: &str = "model.hash";
pub const MODEL_METADATA_FILE: &str = "model_metadata.json";
pub const FEATURE_IMPORTANCE_FILE: &str = "feature_importance.csv";

/// Cross-process encoding and schema agreement.
///
/// `encoders` maps a column name to its categories in fit order; the position
/// of a category in its list is its code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureInfo {
    pub schema_version: u32,
    pub reference_year: i32,
    pub feature_columns: Vec<String>,
    pub target_column: String,
    pub encoders: BTreeMap<String, EncodingTable>,
    pub train_size: usize,
    pub test_size: usize,
}

impl FeatureInfo {
    /// Describe the current schema with freshly fit encoders.
    pub fn new(encoder: &CategoricalEncoder, train_size: usize, test_size: usize) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            reference_year: REFERENCE_YEAR,
            feature_columns: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            target_column: TARGET_COLUMN.to_string(),
            encoders: encoder.to_tables(),
            train_size,
            test_size,
        }
    }

    /// Reject artifacts produced under a different schema version.
    pub fn verify_schema(&self) -> Result<()> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(PipelineError::schema(format!(
                "feature_info schema version {} does not match {}",
                self.schema_version, SCHEMA_VERSION
            )));
        }
        if self.reference_year != REFERENCE_YEAR {
            return Err(PipelineError::schema(format!(
                "feature_info reference year {} does not match {}",
                self.reference_year, REFERENCE_YEAR
            )));
        }
        if self.target_column != TARGET_COLUMN {
            return Err(PipelineError::schema(format!(
                "target column `{}` does not match `{}`",
                self.target_column, TARGET_COLUMN
            )));
        }
        verify_columns(&self.feature_columns)
    }

    /// Rebuild the apply-mode encoder from the persisted tables.
    pub fn encoder(&self) -> Result<CategoricalEncoder> {
        CategoricalEncoder::from_tables(&self.encoders)
    }

    /// Content hash used to tie a model to the tables it was trained with.
    pub fn fingerprint(&self) -> Result<String> {
        Ok(hash_canonical_hex(self)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, to_canonical_json_pretty(self)?)?;
        info!(path = %path.display(), "wrote feature info");
        Ok(())
    }

    /// Load and verify against the pinned schema.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let info: FeatureInfo = serde_json::from_str(&content)?;
        info.verify_schema()?;
        Ok(info)
    }
}

/// Descriptive metadata written next to a trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_type: String,
    pub model_hash: String,
    pub feature_columns: Vec<String>,
    pub feature_info_fingerprint: String,
    pub metrics: BTreeMap<String, f64>,
    pub trainer_version: String,
    pub created_at: String,
}

impl ModelMetadata {
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, to_canonical_json_pretty(self)?)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Check that this model was trained against `info` under the pinned schema.
    pub fn verify_against(&self, info: &FeatureInfo) -> Result<()> {
        verify_columns(&self.feature_columns)?;
        let fingerprint = info.fingerprint()?;
        if self.feature_info_fingerprint != fingerprint {
            return Err(PipelineError::schema(format!(
                "model was trained with feature_info {} but {} is loaded",
                self.feature_info_fingerprint, fingerprint
            )));
        }
        Ok(())
    }
}
