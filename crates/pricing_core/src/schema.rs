//! Pinned feature vector schema and the vector builder
//!
//! Column order, the derived-feature formulas and the reference year together
//! form one schema version. Any change is a new version, never an in-place
//! edit: trained weights are tied to column positions.

use crate::encoding::{CategoricalColumn, CategoricalEncoder};
use crate::errors::{PipelineError, Result};
use crate::features::EngineeredFeatureRecord;
use serde::{Deserialize, Serialize};

/// Version of the column order + formula set below.
pub const SCHEMA_VERSION: u32 = 1;

/// Year that `age = REFERENCE_YEAR - year_built` is measured against.
pub const REFERENCE_YEAR: i32 = 2024;

pub const FEATURE_COUNT: usize = 19;

/// Column order of every [`FeatureVector`].
pub const FEATURE_COLUMNS: [&str; FEATURE_COUNT] = [
    "sqft",
    "beds",
    "baths",
    "age",
    "lot_size_acres",
    "stories",
    "garage_spaces",
    "has_pool_num",
    "renovated_num",
    "distance_to_downtown",
    "crime_index",
    "school_rating",
    "neighborhood_quality",
    "location_score",
    "bed_bath_ratio",
    "total_rooms",
    "sqft_per_bed",
    "neighborhood_encoded",
    "property_type_encoded",
];

pub const TARGET_COLUMN: &str = "sale_price";

/// Position of a named column in the pinned order.
pub fn column_index(name: &str) -> Option<usize> {
    FEATURE_COLUMNS.iter().position(|c| *c == name)
}

/// Check that a persisted column list matches the pinned order exactly.
pub fn verify_columns<S: AsRef<str>>(columns: &[S]) -> Result<()> {
    if columns.len() != FEATURE_COUNT {
        return Err(PipelineError::schema(format!(
            "expected {} feature columns, found {}",
            FEATURE_COUNT,
            columns.len()
        )));
    }
    for (position, (found, expected)) in columns.iter().zip(FEATURE_COLUMNS.iter()).enumerate() {
        if found.as_ref() != *expected {
            return Err(PipelineError::schema(format!(
                "column {} is `{}`, expected `{}`",
                position,
                found.as_ref(),
                expected
            )));
        }
    }
    Ok(())
}

/// Fixed-length numeric input to the regressor, in [`FEATURE_COLUMNS`] order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    /// Wrap a slice, rejecting any length other than [`FEATURE_COUNT`].
    pub fn from_slice(values: &[f64]) -> Result<Self> {
        let array: [f64; FEATURE_COUNT] = values.try_into().map_err(|_| {
            PipelineError::schema(format!(
                "feature vector has {} values, expected {}",
                values.len(),
                FEATURE_COUNT
            ))
        })?;
        Ok(Self(array))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        column_index(column).map(|i| self.0[i])
    }

    /// Bit patterns of every value, for byte-level parity checks.
    pub fn to_bits(&self) -> [u64; FEATURE_COUNT] {
        self.0.map(f64::to_bits)
    }

    /// Column name / value pairs in schema order.
    pub fn named(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_COLUMNS.iter().copied().zip(self.0.iter().copied())
    }
}

/// A built vector plus the categorical columns that fell back to the sentinel.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledVector {
    pub vector: FeatureVector,
    pub unseen: Vec<CategoricalColumn>,
}

/// Emits the pinned 19-column vector from an engineered record and the fit
/// encoding tables.
#[derive(Debug, Clone, Copy)]
pub struct FeatureVectorBuilder<'a> {
    encoder: &'a CategoricalEncoder,
}

impl<'a> FeatureVectorBuilder<'a> {
    pub fn new(encoder: &'a CategoricalEncoder) -> Self {
        Self { encoder }
    }

    /// Build the vector for one record.
    pub fn build(&self, record: &EngineeredFeatureRecord) -> Result<FeatureVector> {
        self.assemble(record).map(|assembled| assembled.vector)
    }

    /// Build the vector and report which categorical lookups were unseen.
    pub fn assemble(&self, record: &EngineeredFeatureRecord) -> Result<AssembledVector> {
        let raw = &record.raw;
        require_present("neighborhood", &raw.neighborhood)?;
        require_present("property_type", &raw.property_type)?;

        let neighborhood = self.encoder.encode(CategoricalColumn::Neighborhood, raw);
        let property_type = self.encoder.encode(CategoricalColumn::PropertyType, raw);

        let mut unseen = Vec::new();
        if neighborhood.unseen {
            unseen.push(CategoricalColumn::Neighborhood);
        }
        if property_type.unseen {
            unseen.push(CategoricalColumn::PropertyType);
        }

        let vector = FeatureVector([
            f64::from(raw.sqft),
            f64::from(raw.beds),
            raw.baths,
            f64::from(record.age),
            raw.lot_size_acres,
            raw.stories,
            f64::from(raw.garage_spaces),
            flag(raw.has_pool),
            flag(raw.renovated),
            raw.distance_to_downtown_miles,
            raw.crime_index,
            f64::from(raw.school_rating),
            record.neighborhood_quality,
            record.location_score,
            record.bed_bath_ratio,
            record.total_rooms,
            record.sqft_per_bed,
            neighborhood.code as f64,
            property_type.code as f64,
        ]);

        Ok(AssembledVector { vector, unseen })
    }
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

fn require_present(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(PipelineError::schema(format!(
            "required source field `{field}` is absent"
        )));
    }
    Ok(())
}
