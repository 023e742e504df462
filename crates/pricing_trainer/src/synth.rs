//! Synthetic sale generation
//!
//! [`PriceSynthesizer`] turns a neighborhood profile and a random source into
//! one priced record. Draws are taken in a fixed order, so a given seed
//! always reproduces the same dataset.

use crate::deterministic::{RandomSource, SeededSource};
use chrono::{Duration, NaiveDate};
use mhd_pricing_core::neighborhoods::{MARKET_CITY, MARKET_STATE};
use mhd_pricing_core::{NeighborhoodProfile, RawPropertyRecord, NEIGHBORHOODS, REFERENCE_YEAR};
use std::collections::BTreeMap;
use tracing::{info, instrument};

pub const MIN_SQFT: f64 = 600.0;
pub const MAX_SQFT: f64 = 6000.0;
pub const MIN_LOT_ACRES: f64 = 0.05;
pub const MAX_LOT_ACRES: f64 = 5.0;
pub const MEAN_LOT_ACRES: f64 = 0.25;
pub const PRICE_FLOOR: f64 = 50_000.0;
/// Sale dates fall within this many days before the as-of date.
pub const SALE_WINDOW_DAYS: usize = 730;

/// Build eras as `(first_year, last_year, weight)`.
const YEAR_ERAS: [(i32, i32, f64); 5] = [
    (1920, 1949, 0.30),
    (1950, 1969, 0.30),
    (1970, 1989, 0.20),
    (1990, 2009, 0.12),
    (2010, REFERENCE_YEAR, 0.08),
];

const STORIES: [f64; 5] = [1.0, 1.5, 2.0, 2.5, 3.0];
const STORY_WEIGHTS: [f64; 5] = [0.35, 0.10, 0.45, 0.05, 0.05];

const GARAGE_PROBABILITY: f64 = 0.7;
const GARAGE_SPACES: [u32; 3] = [1, 2, 3];
const GARAGE_WEIGHTS: [f64; 3] = [0.3, 0.6, 0.1];

const HALF_BATH_PROBABILITY: f64 = 0.4;
const RENOVATION_PROBABILITY: f64 = 0.3;
const RENOVATION_CUTOFF_YEAR: i32 = 2000;

pub const PROPERTY_TYPES: [&str; 4] = ["Single Family", "Townhouse", "Condo", "Multi-Family"];
const PROPERTY_TYPE_WEIGHTS: [f64; 4] = [0.75, 0.12, 0.08, 0.05];

const LOT_BONUS_THRESHOLD: f64 = 0.2;
const LOT_BONUS_PER_ACRE: f64 = 15_000.0;
const GARAGE_BONUS_PER_SPACE: f64 = 8_000.0;
const POOL_BONUS: f64 = 25_000.0;
const RENOVATION_BONUS: f64 = 20_000.0;

/// Bedroom choices and weights for a given square footage.
fn bedroom_table(sqft: u32) -> (&'static [u32], &'static [f64]) {
    match sqft {
        0..=999 => (&[1, 2], &[0.6, 0.4]),
        1000..=1499 => (&[2, 3], &[0.5, 0.5]),
        1500..=2499 => (&[3, 4], &[0.6, 0.4]),
        _ => (&[4, 5, 6], &[0.5, 0.35, 0.15]),
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Generates priced records from neighborhood profiles.
#[derive(Debug, Clone, Copy)]
pub struct PriceSynthesizer {
    reference_year: i32,
}

impl Default for PriceSynthesizer {
    fn default() -> Self {
        Self {
            reference_year: REFERENCE_YEAR,
        }
    }
}

impl PriceSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce one record with a synthetic `sale_price`.
    ///
    /// Draw order: sqft (2), beds (1), baths (2), year (2), lot (1),
    /// stories (1), garage (1 or 2), pool (1), renovation (0 or 1),
    /// distance (1), price noise (1), postal code (1), property type (1).
    pub fn synthesize(
        &self,
        profile: &NeighborhoodProfile,
        rng: &mut dyn RandomSource,
    ) -> RawPropertyRecord {
        let avg_sqft = f64::from(profile.avg_sqft);
        let sqft = (avg_sqft + avg_sqft * 0.25 * rng.standard_normal())
            .trunc()
            .clamp(MIN_SQFT, MAX_SQFT) as u32;

        let (bed_choices, bed_weights) = bedroom_table(sqft);
        let beds = bed_choices[rng.choose_weighted(bed_weights)];

        let dropped = rng.below(2) as u32;
        let mut baths = f64::from(beds.saturating_sub(dropped).max(1).min(beds + 1));
        if rng.next_f64() > 1.0 - HALF_BATH_PROBABILITY {
            baths += 0.5;
        }

        let era_weights: Vec<f64> = YEAR_ERAS.iter().map(|(_, _, w)| *w).collect();
        let (first, last, _) = YEAR_ERAS[rng.choose_weighted(&era_weights)];
        let year_built = first + rng.below((last - first + 1) as usize) as i32;

        let lot_size_acres = rng
            .exponential(MEAN_LOT_ACRES)
            .clamp(MIN_LOT_ACRES, MAX_LOT_ACRES);

        let stories = STORIES[rng.choose_weighted(&STORY_WEIGHTS)];

        let garage_spaces = if rng.next_f64() > 1.0 - GARAGE_PROBABILITY {
            GARAGE_SPACES[rng.choose_weighted(&GARAGE_WEIGHTS)]
        } else {
            0
        };

        let no_pool = (0.95 - profile.price_factor * 0.15).clamp(0.0, 1.0);
        let has_pool = rng.next_f64() > no_pool;

        let renovated = if year_built < RENOVATION_CUTOFF_YEAR {
            rng.next_f64() > 1.0 - RENOVATION_PROBABILITY
        } else {
            false
        };

        let (near, far) = profile.distance_range();
        let distance = rng.uniform(near, far);

        let base_price = f64::from(sqft) * profile.price_per_sqft();
        let age = f64::from(self.reference_year - year_built);
        let age_factor = (1.0 - age * 0.003).max(0.6);

        let lot_bonus = if lot_size_acres > LOT_BONUS_THRESHOLD {
            (lot_size_acres - LOT_BONUS_THRESHOLD) * LOT_BONUS_PER_ACRE
        } else {
            0.0
        };
        let garage_bonus = f64::from(garage_spaces) * GARAGE_BONUS_PER_SPACE;
        let pool_bonus = if has_pool { POOL_BONUS } else { 0.0 };
        let reno_bonus = if renovated { RENOVATION_BONUS } else { 0.0 };

        let noisy = (base_price * age_factor + lot_bonus + garage_bonus + pool_bonus + reno_bonus)
            * rng.uniform(0.9, 1.1);
        let sale_price = ((noisy / 1000.0).round() * 1000.0).max(PRICE_FLOOR);

        let postal_code = profile.valid_postal_codes[rng.below(profile.valid_postal_codes.len())];
        let property_type = PROPERTY_TYPES[rng.choose_weighted(&PROPERTY_TYPE_WEIGHTS)];

        RawPropertyRecord {
            sqft,
            beds,
            baths,
            year_built,
            lot_size_acres: round_to(lot_size_acres, 3),
            stories,
            garage_spaces,
            has_pool,
            renovated,
            neighborhood: profile.name.to_string(),
            postal_code: postal_code.to_string(),
            distance_to_downtown_miles: round_to(distance, 2),
            crime_index: profile.crime_index,
            school_rating: profile.school_rating,
            property_type: property_type.to_string(),
            sale_price: Some(sale_price as u64),
        }
    }
}

/// A generated record with its sale context.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSale {
    pub record: RawPropertyRecord,
    pub sale_date: NaiveDate,
    pub city: String,
    pub state: String,
}

/// Generate `n` sales from a seeded source.
#[instrument(level = "debug")]
pub fn generate_dataset(n: usize, seed: u64, as_of: NaiveDate) -> Vec<SyntheticSale> {
    let mut rng = SeededSource::new(seed);
    generate_with(n, &mut rng, as_of)
}

/// Generate `n` sales, drawing per record: neighborhood, the record itself,
/// then the sale date.
pub fn generate_with(n: usize, rng: &mut dyn RandomSource, as_of: NaiveDate) -> Vec<SyntheticSale> {
    let synthesizer = PriceSynthesizer::new();
    let mut sales = Vec::with_capacity(n);
    for _ in 0..n {
        let profile = &NEIGHBORHOODS[rng.below(NEIGHBORHOODS.len())];
        let record = synthesizer.synthesize(profile, rng);
        let days_ago = rng.below(SALE_WINDOW_DAYS) as i64;
        sales.push(SyntheticSale {
            record,
            sale_date: as_of - Duration::days(days_ago),
            city: MARKET_CITY.to_string(),
            state: MARKET_STATE.to_string(),
        });
    }
    sales
}

/// Summary statistics over a generated dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSummary {
    pub count: usize,
    pub min_price: u64,
    pub max_price: u64,
    pub median_price: f64,
    pub mean_sqft: f64,
    pub neighborhoods: usize,
    /// Median sale price per neighborhood
    pub neighborhood_medians: BTreeMap<String, f64>,
}

impl DatasetSummary {
    pub fn from_sales(sales: &[SyntheticSale]) -> Option<Self> {
        if sales.is_empty() {
            return None;
        }
        let prices: Vec<u64> = sales.iter().filter_map(|s| s.record.sale_price).collect();
        let mut by_neighborhood: BTreeMap<String, Vec<u64>> = BTreeMap::new();
        for sale in sales {
            if let Some(price) = sale.record.sale_price {
                by_neighborhood
                    .entry(sale.record.neighborhood.clone())
                    .or_default()
                    .push(price);
            }
        }
        let total_sqft: f64 = sales.iter().map(|s| f64::from(s.record.sqft)).sum();

        Some(Self {
            count: sales.len(),
            min_price: prices.iter().copied().min().unwrap_or(0),
            max_price: prices.iter().copied().max().unwrap_or(0),
            median_price: median_u64(prices),
            mean_sqft: total_sqft / sales.len() as f64,
            neighborhoods: by_neighborhood.len(),
            neighborhood_medians: by_neighborhood
                .into_iter()
                .map(|(name, prices)| (name, median_u64(prices)))
                .collect(),
        })
    }

    pub fn log(&self) {
        info!(
            records = self.count,
            min_price = self.min_price,
            max_price = self.max_price,
            median_price = self.median_price,
            mean_sqft = self.mean_sqft.round(),
            neighborhoods = self.neighborhoods,
            "generated dataset"
        );
        let mut ranked: Vec<_> = self.neighborhood_medians.iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(a.1));
        for (name, median) in ranked.into_iter().take(10) {
            info!(neighborhood = %name, median_price = median, "neighborhood median");
        }
    }
}

fn median_u64(mut values: Vec<u64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] as f64 + values[mid] as f64) / 2.0
    } else {
        values[mid] as f64
    }
}
