//! Deterministic gradient-boosted tree price model
//!
//! - Fixed-point integer traversal; floats only at the quantize boundary
//! - Canonical JSON model files with BLAKE3 hashes
//! - Tree traversal goes left on `feature <= threshold`

pub mod model;
pub mod tree;

pub use model::{dequantize, quantize, tree_contribution, Model, ModelError, SCALE};
pub use tree::{Node, Tree};
