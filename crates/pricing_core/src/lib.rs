//! Shared pricing pipeline for MHD residential valuation
//!
//! Single source of truth for everything the training pass and the serving
//! process must agree on bit for bit.
//!
//! Modules:
//! - `neighborhoods`: static market reference data
//! - `record`: raw property records and their invariants
//! - `features`: derived-feature arithmetic
//! - `encoding`: categorical encoder (fit and apply modes)
//! - `schema`: pinned column order and the feature vector builder
//! - `artifacts`: `feature_info` and model metadata files
//! - `gbdt`: integer-only gradient-boosted price model
//! - `regressor`: the model seam used by the prediction service

pub mod artifacts;
pub mod encoding;
pub mod errors;
pub mod features;
pub mod gbdt;
pub mod neighborhoods;
pub mod record;
pub mod regressor;
pub mod schema;
pub mod serde_canon;

pub use artifacts::{FeatureInfo, ModelMetadata};
pub use encoding::{CategoricalColumn, CategoricalEncoder, Encoded, EncodingTable, UNSEEN_CODE};
pub use errors::{PipelineError, Result};
pub use features::{EngineeredFeatureRecord, FeatureEngineer};
pub use gbdt::Model as PriceModel;
pub use neighborhoods::{find_profile, NeighborhoodProfile, NEIGHBORHOODS};
pub use record::RawPropertyRecord;
pub use regressor::Regressor;
pub use schema::{
    AssembledVector, FeatureVector, FeatureVectorBuilder, FEATURE_COLUMNS, FEATURE_COUNT,
    REFERENCE_YEAR, SCHEMA_VERSION, TARGET_COLUMN,
};

/// Crate version string for metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engineer, encode and assemble one record: the complete transform shared
/// by the batch path and the live path.
pub fn vectorize(
    engineer: &FeatureEngineer,
    encoder: &CategoricalEncoder,
    record: &RawPropertyRecord,
) -> Result<AssembledVector> {
    let engineered = engineer.engineer(record)?;
    FeatureVectorBuilder::new(encoder).assemble(&engineered)
}
