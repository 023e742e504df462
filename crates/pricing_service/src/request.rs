//! Prediction request payload and its bounds

use mhd_pricing_core::record::MIN_YEAR_BUILT;
use mhd_pricing_core::{find_profile, PipelineError, RawPropertyRecord, Result, REFERENCE_YEAR};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PROPERTY_TYPE: &str = "Single Family";

/// A property as submitted by a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRequest {
    pub sqft: u32,
    pub beds: u32,
    pub baths: f64,
    pub year_built: i32,
    pub lot_size_acres: f64,
    #[serde(default = "default_stories")]
    pub stories: f64,
    #[serde(default)]
    pub garage_spaces: u32,
    #[serde(default)]
    pub has_pool: bool,
    #[serde(default)]
    pub renovated: bool,
    pub neighborhood: String,
    /// Falls back to the neighborhood's first ZIP code
    #[serde(default)]
    pub postal_code: Option<String>,
    pub distance_to_downtown: f64,
    pub crime_index: f64,
    pub school_rating: u32,
    #[serde(default = "default_property_type")]
    pub property_type: String,
}

fn default_stories() -> f64 {
    1.0
}

fn default_property_type() -> String {
    DEFAULT_PROPERTY_TYPE.to_string()
}

fn check_range<T>(field: &str, value: T, low: T, high: T) -> Result<()>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    // NaN fails both comparisons and is rejected
    if value >= low && value <= high {
        Ok(())
    } else {
        Err(PipelineError::validation(
            field,
            format!("{value} is outside [{low}, {high}]"),
        ))
    }
}

impl PropertyRequest {
    /// Check the request bounds.
    pub fn validate(&self) -> Result<()> {
        check_range("sqft", self.sqft, 400, 10_000)?;
        check_range("beds", self.beds, 1, 10)?;
        check_range("baths", self.baths, 1.0, 10.0)?;
        check_range("year_built", self.year_built, MIN_YEAR_BUILT, REFERENCE_YEAR)?;
        check_range("lot_size_acres", self.lot_size_acres, 0.01, 10.0)?;
        check_range("stories", self.stories, 1.0, 4.0)?;
        check_range("garage_spaces", self.garage_spaces, 0, 5)?;
        check_range("distance_to_downtown", self.distance_to_downtown, 0.0, 30.0)?;
        check_range("crime_index", self.crime_index, 0.0, 1.0)?;
        check_range("school_rating", self.school_rating, 1, 10)?;
        if self.property_type.trim().is_empty() {
            return Err(PipelineError::validation("property_type", "must not be empty"));
        }
        Ok(())
    }

    /// Validate and convert into the shared record type.
    pub fn to_record(&self) -> Result<RawPropertyRecord> {
        self.validate()?;
        let profile = find_profile(&self.neighborhood).ok_or_else(|| {
            PipelineError::validation(
                "neighborhood",
                format!("unknown neighborhood `{}`", self.neighborhood),
            )
        })?;
        let postal_code = match self.postal_code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => code.to_string(),
            _ => profile
                .valid_postal_codes
                .first()
                .map(|code| code.to_string())
                .unwrap_or_default(),
        };

        let record = RawPropertyRecord {
            sqft: self.sqft,
            beds: self.beds,
            baths: self.baths,
            year_built: self.year_built,
            lot_size_acres: self.lot_size_acres,
            stories: self.stories,
            garage_spaces: self.garage_spaces,
            has_pool: self.has_pool,
            renovated: self.renovated,
            neighborhood: self.neighborhood.clone(),
            postal_code,
            distance_to_downtown_miles: self.distance_to_downtown,
            crime_index: self.crime_index,
            school_rating: self.school_rating,
            property_type: self.property_type.clone(),
            sale_price: None,
        };
        record.validate()?;
        Ok(record)
    }
}
