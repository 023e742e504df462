//! MHD Pricing Trainer - the offline half of the valuation pipeline
//!
//! Generates synthetic Memphis sales, runs the fit pass that produces the
//! encoding tables, trains a deterministic fixed-point GBDT and evaluates it
//! on a hold-out split.

pub mod cart;
pub mod dataset;
pub mod deterministic;
pub mod errors;
pub mod evaluate;
pub mod pipeline;
pub mod prep;
pub mod synth;
pub mod trainer;

pub use dataset::{read_sales, write_sales, Dataset, SaleRow};
pub use deterministic::{RandomSource, SeededSource, SequenceSource, SplitTieBreaker};
pub use errors::TrainerError;
pub use evaluate::{EvaluationReport, RegressionMetrics};
pub use prep::{prepare, PrepConfig, PreparedData};
pub use synth::{generate_dataset, PriceSynthesizer, SyntheticSale};
pub use trainer::{GbdtConfig, GbdtTrainer};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
