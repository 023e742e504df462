//! Integer-only gradient-boosted price model
//!
//! Features and prices are quantized to fixed-point integers at `scale`
//! before traversal, so a given vector scores identically on every platform.

use super::tree::Tree;
use crate::regressor::Regressor;
use crate::schema::{FeatureVector, FEATURE_COUNT};
use crate::serde_canon::{hash_canonical_hex, to_canonical_json};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Model hash mismatch: expected {expected}, computed {computed}")]
    HashMismatch { expected: String, computed: String },
}

/// Default fixed-point scale (1e6)
pub const SCALE: i64 = 1_000_000;

pub const MODEL_FORMAT_VERSION: i32 = 1;

/// Convert a real value to fixed point at `scale`, saturating at the i64 range.
pub fn quantize(value: f64, scale: i64) -> i64 {
    if value.is_nan() {
        return 0;
    }
    // `as` saturates for out-of-range floats
    (value * scale as f64).round() as i64
}

pub fn dequantize(value: i64, scale: i64) -> f64 {
    value as f64 / scale as f64
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Model {
    pub version: i32,
    pub scale: i64,
    pub feature_count: usize,
    pub trees: Vec<Tree>,
    /// Initial prediction at `scale`
    pub bias: i64,
}

impl Model {
    pub fn new(trees: Vec<Tree>, bias: i64) -> Self {
        Self::with_scale(trees, bias, SCALE)
    }

    pub fn with_scale(trees: Vec<Tree>, bias: i64, scale: i64) -> Self {
        Self {
            version: MODEL_FORMAT_VERSION,
            scale,
            feature_count: FEATURE_COUNT,
            trees,
            bias,
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.version != MODEL_FORMAT_VERSION {
            return Err(ModelError::ValidationFailed(format!(
                "unsupported model version {}",
                self.version
            )));
        }
        if self.scale <= 0 {
            return Err(ModelError::ValidationFailed(format!(
                "invalid scale {}",
                self.scale
            )));
        }
        if self.feature_count != FEATURE_COUNT {
            return Err(ModelError::ValidationFailed(format!(
                "model expects {} features, schema has {}",
                self.feature_count, FEATURE_COUNT
            )));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.feature_count)
                .map_err(|e| ModelError::ValidationFailed(format!("tree {i}: {e}")))?;
        }
        Ok(())
    }

    /// Quantize a real-valued vector at this model's scale.
    pub fn quantize_features(&self, features: &[f64]) -> Vec<i64> {
        features.iter().map(|&v| quantize(v, self.scale)).collect()
    }

    /// Fixed-point score: `bias + sum(leaf * weight / scale)`.
    pub fn score(&self, features: &[i64]) -> i64 {
        self.trees.iter().fold(self.bias, |sum, tree| {
            sum.saturating_add(tree_contribution(tree, tree.evaluate(features), self.scale))
        })
    }

    pub fn to_canonical_json(&self) -> Result<String, ModelError> {
        Ok(to_canonical_json(self)?)
    }

    pub fn hash_hex(&self) -> Result<String, ModelError> {
        Ok(hash_canonical_hex(self)?)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), ModelError> {
        fs::write(path, self.to_canonical_json()?)?;
        Ok(())
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let json = fs::read_to_string(path)?;
        let model: Model = serde_json::from_str(&json)?;
        model.validate()?;
        Ok(model)
    }

    /// Load and check against a recorded hex hash.
    pub fn load_verified<P: AsRef<Path>>(path: P, expected_hash: &str) -> Result<Self, ModelError> {
        let model = Self::load_json(path)?;
        let computed = model.hash_hex()?;
        if computed != expected_hash.trim() {
            return Err(ModelError::HashMismatch {
                expected: expected_hash.trim().to_string(),
                computed,
            });
        }
        Ok(model)
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Share of split nodes using each feature.
    pub fn split_importance(&self) -> Vec<f64> {
        let mut counts = vec![0u64; self.feature_count];
        for tree in &self.trees {
            for feature in tree.split_features() {
                if let Some(count) = counts.get_mut(feature) {
                    *count += 1;
                }
            }
        }
        let total: u64 = counts.iter().sum();
        counts
            .into_iter()
            .map(|c| if total == 0 { 0.0 } else { c as f64 / total as f64 })
            .collect()
    }
}

/// A tree's fixed-point contribution to the score for a given leaf value.
pub fn tree_contribution(tree: &Tree, leaf_value: i64, scale: i64) -> i64 {
    let weighted = i128::from(leaf_value) * i128::from(tree.weight) / i128::from(scale);
    weighted.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

impl Regressor for Model {
    fn predict(&self, vector: &FeatureVector) -> f64 {
        let features = self.quantize_features(vector.as_slice());
        dequantize(self.score(&features), self.scale)
    }

    fn version(&self) -> Option<String> {
        self.hash_hex().ok()
    }
}
