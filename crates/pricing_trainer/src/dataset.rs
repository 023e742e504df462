//! Tabular dataset files
//!
//! Two layouts: the raw sales file (one generated sale per row) and the
//! prepared split files whose header is the pinned feature columns followed
//! by the target column.

use crate::deterministic::xxhash64_i64;
use crate::errors::{Result, TrainerError};
use crate::synth::SyntheticSale;
use chrono::NaiveDate;
use mhd_pricing_core::gbdt::{quantize, SCALE};
use mhd_pricing_core::schema::verify_columns;
use mhd_pricing_core::{FeatureVector, RawPropertyRecord, FEATURE_COLUMNS, FEATURE_COUNT, TARGET_COLUMN};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One row of the raw sales file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRow {
    pub sale_price: u64,
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
    pub sale_date: Option<NaiveDate>,
    pub city: Option<String>,
    pub state: Option<String>,
}

impl From<&SyntheticSale> for SaleRow {
    fn from(sale: &SyntheticSale) -> Self {
        let r = &sale.record;
        Self {
            sale_price: r.sale_price.unwrap_or(0),
            sqft: r.sqft,
            beds: r.beds,
            baths: r.baths,
            year_built: r.year_built,
            lot_size_acres: r.lot_size_acres,
            stories: r.stories,
            garage_spaces: r.garage_spaces,
            has_pool: r.has_pool,
            renovated: r.renovated,
            neighborhood: r.neighborhood.clone(),
            postal_code: r.postal_code.clone(),
            distance_to_downtown_miles: r.distance_to_downtown_miles,
            crime_index: r.crime_index,
            school_rating: r.school_rating,
            property_type: r.property_type.clone(),
            sale_date: Some(sale.sale_date),
            city: Some(sale.city.clone()),
            state: Some(sale.state.clone()),
        }
    }
}

impl From<SaleRow> for RawPropertyRecord {
    fn from(row: SaleRow) -> Self {
        Self {
            sqft: row.sqft,
            beds: row.beds,
            baths: row.baths,
            year_built: row.year_built,
            lot_size_acres: row.lot_size_acres,
            stories: row.stories,
            garage_spaces: row.garage_spaces,
            has_pool: row.has_pool,
            renovated: row.renovated,
            neighborhood: row.neighborhood,
            postal_code: row.postal_code,
            distance_to_downtown_miles: row.distance_to_downtown_miles,
            crime_index: row.crime_index,
            school_rating: row.school_rating,
            property_type: row.property_type,
            sale_price: Some(row.sale_price),
        }
    }
}

/// Write generated sales to a CSV file.
pub fn write_sales<P: AsRef<Path>>(path: P, sales: &[SyntheticSale]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    for sale in sales {
        writer.serialize(SaleRow::from(sale))?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a raw sales file into training records.
pub fn read_sales<P: AsRef<Path>>(path: P) -> Result<Vec<RawPropertyRecord>> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;
    let mut records = Vec::new();
    for (line, row) in reader.deserialize::<SaleRow>().enumerate() {
        let row = row.map_err(|e| TrainerError::Dataset(format!("row {}: {e}", line + 1)))?;
        records.push(row.into());
    }
    if records.is_empty() {
        return Err(TrainerError::Dataset("sales file has no rows".to_string()));
    }
    Ok(records)
}

/// Feature vectors with their sale prices.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dataset {
    pub rows: Vec<FeatureVector>,
    pub targets: Vec<f64>,
}

impl Dataset {
    pub fn new(rows: Vec<FeatureVector>, targets: Vec<f64>) -> Result<Self> {
        if rows.len() != targets.len() {
            return Err(TrainerError::Dataset(format!(
                "{} rows but {} targets",
                rows.len(),
                targets.len()
            )));
        }
        Ok(Self { rows, targets })
    }

    /// Load a prepared split file, checking the header against the pinned schema.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path.as_ref())?;
        let headers = reader.headers()?.clone();
        let columns: Vec<&str> = headers.iter().collect();
        match columns.split_last() {
            Some((&target, features)) if target == TARGET_COLUMN => verify_columns(features)?,
            _ => {
                return Err(TrainerError::Dataset(format!(
                    "last column must be `{TARGET_COLUMN}`"
                )))
            }
        }

        let mut rows = Vec::new();
        let mut targets = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            let values = record
                .iter()
                .map(|field| field.trim().parse::<f64>())
                .collect::<std::result::Result<Vec<f64>, _>>()
                .map_err(|e| TrainerError::Dataset(format!("row {}: {e}", line + 1)))?;
            let (target, features) = values
                .split_last()
                .ok_or_else(|| TrainerError::Dataset(format!("row {} is empty", line + 1)))?;
            rows.push(FeatureVector::from_slice(features)?);
            targets.push(*target);
        }

        if rows.is_empty() {
            return Err(TrainerError::Dataset("dataset is empty".to_string()));
        }
        Self::new(rows, targets)
    }

    /// Write with the header `feature_columns + target_column`.
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_path(path.as_ref())?;
        let mut header: Vec<&str> = FEATURE_COLUMNS.to_vec();
        header.push(TARGET_COLUMN);
        writer.write_record(&header)?;
        for (row, target) in self.rows.iter().zip(&self.targets) {
            let mut fields: Vec<String> = row.as_slice().iter().map(|v| v.to_string()).collect();
            fields.push(target.to_string());
            writer.write_record(&fields)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows and targets in fixed point at `scale`.
    pub fn quantized(&self, scale: i64) -> (Vec<Vec<i64>>, Vec<i64>) {
        let features = self
            .rows
            .iter()
            .map(|row| row.as_slice().iter().map(|&v| quantize(v, scale)).collect())
            .collect();
        let targets = self.targets.iter().map(|&t| quantize(t, scale)).collect();
        (features, targets)
    }

    /// Deterministically reorder rows by a seeded hash of their contents.
    pub fn shuffle(&mut self, seed: u64) {
        let mut keyed: Vec<(i64, usize)> = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let mut data: Vec<i64> = row.as_slice().iter().map(|&v| quantize(v, SCALE)).collect();
                data.push(i as i64);
                (xxhash64_i64(&data, seed as i64), i)
            })
            .collect();
        keyed.sort_by_key(|&(hash, i)| (hash, i));

        let rows = keyed.iter().map(|&(_, i)| self.rows[i]).collect();
        let targets = keyed.iter().map(|&(_, i)| self.targets[i]).collect();
        self.rows = rows;
        self.targets = targets;
    }

    /// Shuffle with `seed` and cut off `ceil(len * test_fraction)` rows as the test split.
    pub fn split(mut self, test_fraction: f64, seed: u64) -> Result<(Dataset, Dataset)> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(TrainerError::Dataset(format!(
                "test fraction {test_fraction} must lie in (0, 1)"
            )));
        }
        if self.len() < 2 {
            return Err(TrainerError::Dataset(format!(
                "need at least 2 rows to split, have {}",
                self.len()
            )));
        }
        self.shuffle(seed);
        let test_len = ((self.len() as f64 * test_fraction).ceil() as usize).clamp(1, self.len() - 1);
        let test_rows = self.rows.split_off(self.len() - test_len);
        let test_targets = self.targets.split_off(self.targets.len() - test_len);
        Ok((self, Dataset::new(test_rows, test_targets)?))
    }

    /// Per-column `(min, max)` for logging.
    pub fn feature_stats(&self) -> Vec<(f64, f64)> {
        let mut stats = vec![(f64::INFINITY, f64::NEG_INFINITY); FEATURE_COUNT];
        for row in &self.rows {
            for (stat, &value) in stats.iter_mut().zip(row.as_slice()) {
                stat.0 = stat.0.min(value);
                stat.1 = stat.1.max(value);
            }
        }
        stats
    }
}
