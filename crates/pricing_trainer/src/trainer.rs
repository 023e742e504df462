//! Gradient Boosted Decision Tree (GBDT) trainer
//!
//! Deterministic boosting on squared error with fixed-point arithmetic and
//! exact-greedy CART splits. Training-time predictions are updated with the
//! same contribution rule the model uses at inference.

use mhd_pricing_core::gbdt::{tree_contribution, SCALE};
use mhd_pricing_core::{PriceModel, FEATURE_COUNT};
use tracing::{debug, info, instrument};

use crate::cart::{CartBuilder, SortedColumns, TreeConfig};
use crate::dataset::Dataset;
use crate::errors::{Result, TrainerError};

/// GBDT training configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GbdtConfig {
    pub num_trees: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub learning_rate: i64, // Fixed-point at `scale`, e.g., 100_000 = 0.1
    pub quant_step: i64,
    pub scale: i64,
}

impl Default for GbdtConfig {
    fn default() -> Self {
        Self {
            num_trees: 200,
            max_depth: 6,
            min_samples_leaf: 3,
            learning_rate: 100_000, // 0.1 in fixed-point
            quant_step: 1000,
            scale: SCALE,
        }
    }
}

impl GbdtConfig {
    pub fn validate(&self) -> Result<()> {
        if self.scale <= 0 {
            return Err(TrainerError::Training(format!("invalid scale {}", self.scale)));
        }
        if self.learning_rate <= 0 || self.learning_rate > self.scale {
            return Err(TrainerError::Training(format!(
                "learning rate {} must lie in (0, {}]",
                self.learning_rate, self.scale
            )));
        }
        if self.max_depth == 0 {
            return Err(TrainerError::Training("max_depth must be at least 1".to_string()));
        }
        if self.min_samples_leaf == 0 {
            return Err(TrainerError::Training(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }
        if self.quant_step <= 0 {
            return Err(TrainerError::Training(format!(
                "invalid quant_step {}",
                self.quant_step
            )));
        }
        Ok(())
    }

    /// Model type string recorded in metadata.
    pub fn describe(&self) -> String {
        format!(
            "gbdt-fixed-point(trees={},depth={},min_leaf={},lr={}/{})",
            self.num_trees, self.max_depth, self.min_samples_leaf, self.learning_rate, self.scale
        )
    }
}

/// GBDT trainer
pub struct GbdtTrainer {
    config: GbdtConfig,
}

impl GbdtTrainer {
    pub fn new(config: GbdtConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GbdtConfig {
        &self.config
    }

    /// Fit a price model on the given dataset.
    #[instrument(skip_all, fields(samples = dataset.len(), trees = self.config.num_trees))]
    pub fn train(&self, dataset: &Dataset) -> Result<PriceModel> {
        self.config.validate()?;
        if dataset.is_empty() {
            return Err(TrainerError::Training("cannot train on an empty dataset".to_string()));
        }

        let scale = self.config.scale;
        let (features, targets) = dataset.quantized(scale);
        let columns = SortedColumns::new(&features);
        debug_assert_eq!(columns.feature_count(), FEATURE_COUNT);

        let bias = calculate_bias(&targets);
        let mut predictions = vec![bias; targets.len()];

        let tree_config = TreeConfig {
            max_depth: self.config.max_depth,
            min_samples_leaf: self.config.min_samples_leaf,
            quant_step: self.config.quant_step,
        };

        let mut trees = Vec::with_capacity(self.config.num_trees);
        for tree_idx in 0..self.config.num_trees {
            let gradients = calculate_gradients(&targets, &predictions);
            let builder = CartBuilder::new(&features, &gradients, &columns, tree_config.clone());
            let tree = builder.build(self.config.learning_rate);

            for (prediction, row) in predictions.iter_mut().zip(&features) {
                let contribution = tree_contribution(&tree, tree.evaluate(row), scale);
                *prediction = prediction.saturating_add(contribution);
            }

            debug!(tree = tree_idx + 1, nodes = tree.nodes.len(), "built tree");
            if (tree_idx + 1) % 50 == 0 {
                info!(
                    "Trained {}/{} trees, train rmse {:.0}",
                    tree_idx + 1,
                    self.config.num_trees,
                    fixed_point_rmse(&targets, &predictions, scale)
                );
            }
            trees.push(tree);
        }

        let model = PriceModel::with_scale(trees, bias, scale);
        model.validate()?;
        Ok(model)
    }
}

/// Mean of the targets.
fn calculate_bias(targets: &[i64]) -> i64 {
    if targets.is_empty() {
        return 0;
    }
    let sum: i128 = targets.iter().map(|&t| i128::from(t)).sum();
    (sum / targets.len() as i128) as i64
}

/// Squared-error gradients: prediction - target
fn calculate_gradients(targets: &[i64], predictions: &[i64]) -> Vec<i64> {
    predictions
        .iter()
        .zip(targets)
        .map(|(&p, &t)| p.saturating_sub(t))
        .collect()
}

fn fixed_point_rmse(targets: &[i64], predictions: &[i64], scale: i64) -> f64 {
    if targets.is_empty() {
        return 0.0;
    }
    let sum: f64 = targets
        .iter()
        .zip(predictions)
        .map(|(&t, &p)| {
            let diff = (p - t) as f64 / scale as f64;
            diff * diff
        })
        .sum();
    (sum / targets.len() as f64).sqrt()
}
