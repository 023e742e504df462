//! Data preparation: the fit pass
//!
//! Engineers features, fits the categorical encoder in record order, builds
//! vectors and splits them. The encoder fit here is the only one; serving
//! loads it from `feature_info.json`.

use crate::dataset::Dataset;
use crate::errors::{Result, TrainerError};
use mhd_pricing_core::artifacts::{FEATURE_INFO_FILE, TEST_FILE, TRAIN_FILE};
use mhd_pricing_core::{
    CategoricalColumn, CategoricalEncoder, FeatureEngineer, FeatureInfo, FeatureVectorBuilder,
    PipelineError, RawPropertyRecord, FEATURE_COLUMNS,
};
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrepConfig {
    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for PrepConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

/// Output of the fit pass.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub train: Dataset,
    pub test: Dataset,
    pub feature_info: FeatureInfo,
    /// Records dropped for failing validation
    pub rejected: usize,
}

/// Run the fit pass over labeled records.
///
/// Invalid records are logged and dropped; a schema failure aborts.
#[instrument(skip_all, fields(records = records.len()))]
pub fn prepare(records: &[RawPropertyRecord], config: &PrepConfig) -> Result<PreparedData> {
    let mut accepted = Vec::with_capacity(records.len());
    let mut rejected = 0usize;
    for (i, record) in records.iter().enumerate() {
        let checked = record.validate().and_then(|_| match record.sale_price {
            Some(_) => Ok(()),
            None => Err(PipelineError::validation("sale_price", "training records need a price")),
        });
        match checked {
            Ok(()) => accepted.push(record),
            Err(err) if err.is_record_scoped() => {
                warn!(row = i, error = %err, "dropping invalid record");
                rejected += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }

    let engineer = FeatureEngineer::new();
    let mut engineered = Vec::with_capacity(accepted.len());
    let mut targets = Vec::with_capacity(accepted.len());
    for (record, result) in accepted
        .iter()
        .zip(engineer.engineer_batch(accepted.iter().copied()))
    {
        match result {
            Ok(features) => {
                targets.push(record.sale_price.unwrap_or(0) as f64);
                engineered.push(features);
            }
            Err(err) if err.is_record_scoped() => {
                warn!(error = %err, "dropping record that failed feature engineering");
                rejected += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }

    if engineered.len() < 2 {
        return Err(TrainerError::Dataset(format!(
            "only {} usable records after validation",
            engineered.len()
        )));
    }

    let encoder = CategoricalEncoder::fit(engineered.iter().map(|e| &e.raw));
    let builder = FeatureVectorBuilder::new(&encoder);
    let rows = engineered
        .iter()
        .map(|record| builder.build(record))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let (train, test) = Dataset::new(rows, targets)?.split(config.test_fraction, config.seed)?;
    let feature_info = FeatureInfo::new(&encoder, train.len(), test.len());

    info!(
        train = train.len(),
        test = test.len(),
        rejected,
        neighborhoods = encoder.table(CategoricalColumn::Neighborhood).len(),
        "prepared dataset"
    );
    log_target_stats("train", &train.targets);
    log_target_stats("test", &test.targets);
    for (column, (min, max)) in FEATURE_COLUMNS.iter().zip(train.feature_stats()) {
        debug!(column, min, max, "train feature range");
    }

    Ok(PreparedData {
        train,
        test,
        feature_info,
        rejected,
    })
}

/// Write the split files and `feature_info.json`; returns the feature_info fingerprint.
pub fn write_prepared<P: AsRef<Path>>(dir: P, data: &PreparedData) -> Result<String> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    data.train.to_csv(dir.join(TRAIN_FILE))?;
    data.test.to_csv(dir.join(TEST_FILE))?;
    data.feature_info.save(dir.join(FEATURE_INFO_FILE))?;
    let fingerprint = data.feature_info.fingerprint()?;
    info!(dir = %dir.display(), fingerprint = %fingerprint, "wrote prepared data");
    Ok(fingerprint)
}

fn log_target_stats(split: &str, targets: &[f64]) {
    if targets.is_empty() {
        return;
    }
    let mean = targets.iter().sum::<f64>() / targets.len() as f64;
    let mut sorted = targets.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };
    info!(split, mean = mean.round(), median = median.round(), "sale_price statistics");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::generate_dataset;
    use chrono::NaiveDate;
    use mhd_pricing_core::{vectorize, FEATURE_COUNT};
    use tempfile::tempdir;

    fn records(n: usize) -> Vec<RawPropertyRecord> {
        let as_of = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        generate_dataset(n, 42, as_of)
            .into_iter()
            .map(|s| s.record)
            .collect()
    }

    #[test]
    fn encoder_codes_follow_first_seen_order() {
        let records = records(200);
        let prepared = prepare(&records, &PrepConfig::default()).unwrap();
        let table = &prepared.feature_info.encoders[CategoricalColumn::Neighborhood.name()];
        assert_eq!(table.categories()[0], records[0].neighborhood);
        assert_eq!(prepared.train.len() + prepared.test.len(), 200);
        assert_eq!(prepared.test.len(), 40);
    }

    #[test]
    fn invalid_records_are_dropped_not_fatal() {
        let mut records = records(50);
        records[3].sqft = 100;
        records[7].neighborhood = "Atlantis".to_string();
        records[9].sale_price = None;

        let prepared = prepare(&records, &PrepConfig::default()).unwrap();
        assert_eq!(prepared.rejected, 3);
        assert_eq!(prepared.train.len() + prepared.test.len(), 47);
    }

    #[test]
    fn persisted_tables_reproduce_training_vectors() {
        let records = records(120);
        let prepared = prepare(&records, &PrepConfig::default()).unwrap();
        let dir = tempdir().unwrap();
        write_prepared(dir.path(), &prepared).unwrap();

        let info = FeatureInfo::load(dir.path().join(FEATURE_INFO_FILE)).unwrap();
        let encoder = info.encoder().unwrap();
        let all: Vec<_> = prepared
            .train
            .rows
            .iter()
            .chain(prepared.test.rows.iter())
            .map(|v| v.to_bits())
            .collect();

        for record in &records {
            let live = vectorize(&FeatureEngineer::new(), &encoder, record).unwrap();
            assert_eq!(live.vector.as_slice().len(), FEATURE_COUNT);
            assert!(all.contains(&live.vector.to_bits()));
        }
    }
}
