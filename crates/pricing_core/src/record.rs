//! Raw property records shared by the training and serving paths

use crate::errors::{PipelineError, Result};
use crate::neighborhoods::find_profile;
use crate::schema::REFERENCE_YEAR;
use serde::{Deserialize, Serialize};

pub const MIN_SQFT: u32 = 400;
pub const MIN_BEDS: u32 = 1;
pub const MIN_BATHS: f64 = 1.0;
pub const MIN_YEAR_BUILT: i32 = 1900;

/// A property as observed, before any derived features.
///
/// `sale_price` is present only on training records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPropertyRecord {
    pub sqft: u32,
    pub beds: u32,
    pub baths: f64,
    pub year_built: i32,
    pub lot_size_acres: f64,
    pub stories: f64,
    pub garage_spaces: u32,
    pub has_pool: bool,
    pub renovated: bool,
    pub neighborhood: String,
    pub postal_code: String,
    pub distance_to_downtown_miles: f64,
    pub crime_index: f64,
    pub school_rating: u32,
    pub property_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sale_price: Option<u64>,
}

impl RawPropertyRecord {
    /// Check the record-level invariants.
    ///
    /// Failures are record-scoped: callers processing a batch drop the record
    /// and continue.
    pub fn validate(&self) -> Result<()> {
        if self.sqft < MIN_SQFT {
            return Err(PipelineError::validation(
                "sqft",
                format!("{} is below the minimum of {}", self.sqft, MIN_SQFT),
            ));
        }
        if self.beds < MIN_BEDS {
            return Err(PipelineError::validation("beds", "at least one bedroom is required"));
        }
        if !self.baths.is_finite() || self.baths < MIN_BATHS {
            return Err(PipelineError::validation(
                "baths",
                format!("{} is below the minimum of {}", self.baths, MIN_BATHS),
            ));
        }
        if !(MIN_YEAR_BUILT..=REFERENCE_YEAR).contains(&self.year_built) {
            return Err(PipelineError::validation(
                "year_built",
                format!(
                    "{} is outside [{}, {}]",
                    self.year_built, MIN_YEAR_BUILT, REFERENCE_YEAR
                ),
            ));
        }
        if !self.distance_to_downtown_miles.is_finite() || self.distance_to_downtown_miles < 0.0 {
            return Err(PipelineError::validation(
                "distance_to_downtown_miles",
                "must be a non-negative number",
            ));
        }
        if !self.crime_index.is_finite() || !(0.0..=1.0).contains(&self.crime_index) {
            return Err(PipelineError::validation("crime_index", "must lie in [0, 1]"));
        }
        if !(1..=10).contains(&self.school_rating) {
            return Err(PipelineError::validation("school_rating", "must lie in [1, 10]"));
        }
        if !self.lot_size_acres.is_finite() || self.lot_size_acres < 0.0 {
            return Err(PipelineError::validation("lot_size_acres", "must be a non-negative number"));
        }
        if !self.stories.is_finite() || self.stories <= 0.0 {
            return Err(PipelineError::validation("stories", "must be positive"));
        }
        if find_profile(&self.neighborhood).is_none() {
            return Err(PipelineError::validation(
                "neighborhood",
                format!("unknown neighborhood `{}`", self.neighborhood),
            ));
        }
        if self.postal_code.trim().is_empty() {
            return Err(PipelineError::validation("postal_code", "must not be empty"));
        }
        if self.property_type.trim().is_empty() {
            return Err(PipelineError::validation("property_type", "must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn midtown_record() -> RawPropertyRecord {
        RawPropertyRecord {
            sqft: 1800,
            beds: 3,
            baths: 2.0,
            year_built: 1995,
            lot_size_acres: 0.25,
            stories: 2.0,
            garage_spaces: 2,
            has_pool: false,
            renovated: true,
            neighborhood: "Midtown".to_string(),
            postal_code: "38104".to_string(),
            distance_to_downtown_miles: 3.5,
            crime_index: 0.3,
            school_rating: 7,
            property_type: "Single Family".to_string(),
            sale_price: None,
        }
    }

    fn rejected_field(record: &RawPropertyRecord) -> Option<String> {
        match record.validate() {
            Err(PipelineError::Validation { field, .. }) => Some(field),
            _ => None,
        }
    }

    #[test]
    fn valid_record_passes() {
        assert!(midtown_record().validate().is_ok());
    }

    #[test]
    fn rejects_small_houses() {
        let mut record = midtown_record();
        record.sqft = 399;
        assert_eq!(rejected_field(&record).as_deref(), Some("sqft"));
    }

    #[test]
    fn rejects_future_year() {
        let mut record = midtown_record();
        record.year_built = REFERENCE_YEAR + 1;
        assert_eq!(rejected_field(&record).as_deref(), Some("year_built"));
        record.year_built = 1899;
        assert_eq!(rejected_field(&record).as_deref(), Some("year_built"));
    }

    #[test]
    fn rejects_zero_beds_and_baths() {
        let mut record = midtown_record();
        record.beds = 0;
        assert_eq!(rejected_field(&record).as_deref(), Some("beds"));

        let mut record = midtown_record();
        record.baths = 0.0;
        assert_eq!(rejected_field(&record).as_deref(), Some("baths"));
    }

    #[test]
    fn rejects_negative_distance() {
        let mut record = midtown_record();
        record.distance_to_downtown_miles = -0.1;
        assert_eq!(
            rejected_field(&record).as_deref(),
            Some("distance_to_downtown_miles")
        );
    }

    #[test]
    fn rejects_unknown_neighborhood() {
        let mut record = midtown_record();
        record.neighborhood = "Atlantis".to_string();
        let err = record.validate().unwrap_err();
        assert!(err.is_record_scoped());
    }
}
