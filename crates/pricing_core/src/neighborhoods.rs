//! Static market reference data for the Memphis metro area.
//!
//! One profile per neighborhood: price multiplier, baseline square footage,
//! baseline crime index, baseline school rating and the ZIP codes it spans.
//! The table is process-wide constant state and is never mutated.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

/// Market-wide median sale price used to derive per-neighborhood $/sqft.
pub const BASE_MEDIAN_PRICE: f64 = 180_000.0;

/// Market name reported by generated records.
pub const MARKET_CITY: &str = "Memphis";
pub const MARKET_STATE: &str = "TN";

/// Reference data for a single neighborhood.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NeighborhoodProfile {
    pub name: &'static str,
    pub price_factor: f64,
    pub avg_sqft: u32,
    /// Baseline crime index in [0, 1]
    pub crime_index: f64,
    /// Baseline school rating in [1, 10]
    pub school_rating: u32,
    pub valid_postal_codes: &'static [&'static str],
    /// Urban-core neighborhoods sit within 1-5 miles of downtown
    pub urban_core: bool,
}

impl NeighborhoodProfile {
    /// Range of `distance_to_downtown_miles` this neighborhood samples from.
    pub fn distance_range(&self) -> (f64, f64) {
        if self.urban_core {
            (1.0, 5.0)
        } else {
            (5.0, 25.0)
        }
    }

    /// Market $/sqft scaled by this neighborhood's price factor.
    pub fn price_per_sqft(&self) -> f64 {
        BASE_MEDIAN_PRICE / f64::from(self.avg_sqft) * self.price_factor
    }

    pub fn accepts_postal_code(&self, code: &str) -> bool {
        self.valid_postal_codes.contains(&code)
    }
}

const fn profile(
    name: &'static str,
    price_factor: f64,
    avg_sqft: u32,
    crime_index: f64,
    school_rating: u32,
    valid_postal_codes: &'static [&'static str],
    urban_core: bool,
) -> NeighborhoodProfile {
    NeighborhoodProfile {
        name,
        price_factor,
        avg_sqft,
        crime_index,
        school_rating,
        valid_postal_codes,
        urban_core,
    }
}

/// All neighborhoods in table order. Sampling indexes into this slice, so the
/// order is part of the synthetic data contract.
pub static NEIGHBORHOODS: [NeighborhoodProfile; 20] = [
    profile("Downtown", 1.2, 1400, 0.7, 6, &["38103", "38105"], true),
    profile("Midtown", 1.3, 1600, 0.5, 7, &["38104", "38112"], true),
    profile("East Memphis", 1.8, 2200, 0.2, 9, &["38117", "38119", "38120"], false),
    profile("Germantown", 2.2, 2800, 0.1, 10, &["38138", "38139"], false),
    profile("Collierville", 2.0, 2600, 0.1, 9, &["38017"], false),
    profile("Bartlett", 1.4, 1800, 0.2, 8, &["38133", "38134", "38135"], false),
    profile("Cordova", 1.5, 2000, 0.3, 8, &["38016", "38018"], false),
    profile("Whitehaven", 0.7, 1400, 0.6, 5, &["38109", "38116"], false),
    profile("Frayser", 0.5, 1200, 0.8, 4, &["38127"], false),
    profile("Raleigh", 0.6, 1300, 0.7, 5, &["38128"], false),
    profile("Orange Mound", 0.5, 1100, 0.8, 4, &["38114"], false),
    profile("Hickory Hill", 0.6, 1400, 0.6, 5, &["38115", "38118"], false),
    profile("South Memphis", 0.5, 1200, 0.8, 4, &["38106", "38126"], false),
    profile("North Memphis", 0.5, 1100, 0.9, 3, &["38107", "38108"], false),
    profile("Berclair", 0.8, 1500, 0.5, 6, &["38122"], false),
    profile("Cooper-Young", 1.4, 1500, 0.4, 7, &["38104"], true),
    profile("Harbor Town", 1.6, 1800, 0.3, 8, &["38103"], false),
    profile("Mud Island", 1.7, 1700, 0.2, 8, &["38103"], false),
    profile("High Point Terrace", 1.5, 1900, 0.3, 8, &["38111"], false),
    profile("Parkway Village", 0.7, 1400, 0.5, 6, &["38118"], false),
];

static BY_NAME: Lazy<HashMap<&'static str, &'static NeighborhoodProfile>> =
    Lazy::new(|| NEIGHBORHOODS.iter().map(|p| (p.name, p)).collect());

/// Look up a neighborhood by its exact name.
pub fn find_profile(name: &str) -> Option<&'static NeighborhoodProfile> {
    BY_NAME.get(name).copied()
}

/// Neighborhood names in table order.
pub fn neighborhood_names() -> Vec<&'static str> {
    NEIGHBORHOODS.iter().map(|p| p.name).collect()
}
