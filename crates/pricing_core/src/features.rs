//! Derived-feature arithmetic
//!
//! The one transform used by both the batch fit path and the live request
//! path. Changing any formula here is a schema change and requires bumping
//! [`SCHEMA_VERSION`](crate::schema::SCHEMA_VERSION).

use crate::errors::{PipelineError, Result};
use crate::record::RawPropertyRecord;
use crate::schema::REFERENCE_YEAR;
use serde::{Deserialize, Serialize};

/// A raw record together with its derived features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineeredFeatureRecord {
    pub raw: RawPropertyRecord,
    pub age: i32,
    pub bed_bath_ratio: f64,
    pub total_rooms: f64,
    pub sqft_per_bed: f64,
    pub neighborhood_quality: f64,
    pub location_score: f64,
}

/// Maps raw records to engineered records against a pinned reference year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureEngineer {
    reference_year: i32,
}

impl Default for FeatureEngineer {
    fn default() -> Self {
        Self {
            reference_year: REFERENCE_YEAR,
        }
    }
}

impl FeatureEngineer {
    /// Engineer pinned to the current schema's reference year.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reference_year(&self) -> i32 {
        self.reference_year
    }

    /// Derive features for one record.
    ///
    /// Every division guards its denominator by substituting 1 for values
    /// below 1, so malformed zero beds/baths never produce inf or NaN.
    pub fn engineer(&self, record: &RawPropertyRecord) -> Result<EngineeredFeatureRecord> {
        let beds = f64::from(record.beds.max(1));
        let baths = guard_denominator(record.baths);
        let sqft = f64::from(record.sqft);

        if record.sqft == 0 {
            return Err(PipelineError::validation("sqft", "must be positive"));
        }
        if !(beds > 0.0) {
            return Err(PipelineError::validation("beds", "must be positive"));
        }
        if !(baths > 0.0) {
            return Err(PipelineError::validation("baths", "must be positive"));
        }

        Ok(EngineeredFeatureRecord {
            age: self.reference_year - record.year_built,
            bed_bath_ratio: f64::from(record.beds) / baths,
            total_rooms: f64::from(record.beds) + record.baths,
            sqft_per_bed: sqft / beds,
            neighborhood_quality: neighborhood_quality(record.crime_index, record.school_rating),
            location_score: location_score(record.distance_to_downtown_miles),
            raw: record.clone(),
        })
    }

    /// Engineer a batch, keeping per-record failures separate so one bad
    /// record never aborts the batch.
    pub fn engineer_batch<'a, I>(&self, records: I) -> Vec<Result<EngineeredFeatureRecord>>
    where
        I: IntoIterator<Item = &'a RawPropertyRecord>,
    {
        records.into_iter().map(|r| self.engineer(r)).collect()
    }
}

/// Composite of crime and schools on a 0-10 scale.
pub fn neighborhood_quality(crime_index: f64, school_rating: u32) -> f64 {
    (10.0 - crime_index * 10.0 + f64::from(school_rating)) / 2.0
}

/// Inverse distance score; 1.0 at downtown, 0.5 at ten miles.
pub fn location_score(distance_to_downtown_miles: f64) -> f64 {
    1.0 / (1.0 + distance_to_downtown_miles / 10.0)
}

fn guard_denominator(value: f64) -> f64 {
    // f64::max returns 1.0 for NaN
    value.max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::midtown_record;

    #[test]
    fn example_record_features() {
        let engineered = FeatureEngineer::new()
            .engineer(&midtown_record())
            .expect("valid record");

        assert_eq!(engineered.age, 29);
        assert_eq!(engineered.bed_bath_ratio, 1.5);
        assert_eq!(engineered.total_rooms, 5.0);
        assert_eq!(engineered.sqft_per_bed, 600.0);
        assert_eq!(engineered.neighborhood_quality, 7.0);
        assert!((engineered.location_score - 1.0 / 1.35).abs() < 1e-12);
        assert!((engineered.location_score - 0.7407).abs() < 1e-4);
    }

    #[test]
    fn zero_denominators_fall_back_to_one() {
        let mut record = midtown_record();
        record.beds = 0;
        record.baths = 0.0;

        let engineered = FeatureEngineer::new().engineer(&record).expect("guarded");
        assert_eq!(engineered.bed_bath_ratio, 0.0);
        assert_eq!(engineered.sqft_per_bed, 1800.0);
        assert!(engineered.bed_bath_ratio.is_finite());
    }

    #[test]
    fn fractional_baths_below_one_use_one() {
        let mut record = midtown_record();
        record.baths = 0.5;
        let engineered = FeatureEngineer::new().engineer(&record).expect("guarded");
        assert_eq!(engineered.bed_bath_ratio, 3.0);
        assert_eq!(engineered.total_rooms, 3.5);
    }

    #[test]
    fn nan_baths_are_guarded() {
        let mut record = midtown_record();
        record.baths = f64::NAN;
        let engineered = FeatureEngineer::new().engineer(&record).expect("guarded");
        assert_eq!(engineered.bed_bath_ratio, 3.0);
    }

    #[test]
    fn zero_sqft_is_rejected() {
        let mut record = midtown_record();
        record.sqft = 0;
        let err = FeatureEngineer::new().engineer(&record).unwrap_err();
        assert!(matches!(err, PipelineError::Validation { ref field, .. } if field == "sqft"));
    }

    #[test]
    fn batch_keeps_good_records() {
        let good = midtown_record();
        let mut bad = midtown_record();
        bad.sqft = 0;

        let out = FeatureEngineer::new().engineer_batch([&good, &bad, &good]);
        assert_eq!(out.len(), 3);
        assert!(out[0].is_ok());
        assert!(out[1].is_err());
        assert!(out[2].is_ok());
    }

    #[test]
    fn location_score_is_one_at_downtown() {
        assert_eq!(location_score(0.0), 1.0);
        assert_eq!(location_score(10.0), 0.5);
    }
}
