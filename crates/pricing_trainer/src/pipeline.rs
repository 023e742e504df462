//! Directory-level steps run by the `mhd-train` CLI
//!
//! Each step reads the artifacts of the previous one from disk, so steps can
//! be rerun independently.

use crate::dataset::{read_sales, write_sales, Dataset};
use crate::errors::{Result, TrainerError};
use crate::evaluate::{evaluate, rank_importance, write_report, EvaluationReport};
use crate::prep::{prepare, write_prepared, PrepConfig};
use crate::synth::{generate_dataset, DatasetSummary};
use crate::trainer::{GbdtConfig, GbdtTrainer};
use chrono::{NaiveDate, SecondsFormat, Utc};
use mhd_pricing_core::artifacts::{
    FEATURE_IMPORTANCE_FILE, FEATURE_INFO_FILE, MODEL_FILE, MODEL_HASH_FILE, MODEL_METADATA_FILE,
    TEST_FILE, TRAIN_FILE,
};
use mhd_pricing_core::{FeatureInfo, ModelMetadata, PriceModel, FEATURE_COLUMNS};
use std::fs;
use std::path::Path;
use tracing::info;

/// Generate a synthetic sales file.
pub fn generate_to(path: &Path, samples: usize, seed: u64, as_of: NaiveDate) -> Result<DatasetSummary> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let sales = generate_dataset(samples, seed, as_of);
    let summary = DatasetSummary::from_sales(&sales)
        .ok_or_else(|| TrainerError::Dataset("no samples generated".to_string()))?;
    write_sales(path, &sales)?;
    summary.log();
    info!(path = %path.display(), "wrote sales file");
    Ok(summary)
}

/// Run the fit pass over a sales file; returns the feature_info fingerprint.
pub fn prepare_dir(input: &Path, output: &Path, config: &PrepConfig) -> Result<String> {
    let records = read_sales(input)?;
    info!(records = records.len(), path = %input.display(), "loaded sales");
    let prepared = prepare(&records, config)?;
    write_prepared(output, &prepared)
}

/// What a training run produced.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model_hash: String,
    pub metadata: ModelMetadata,
}

/// Fit a model on `train.csv`, score `test.csv`, and write the model artifacts.
pub fn train_dir(data_dir: &Path, model_dir: &Path, config: GbdtConfig) -> Result<TrainingOutcome> {
    let feature_info = FeatureInfo::load(data_dir.join(FEATURE_INFO_FILE))?;
    let train = Dataset::from_csv(data_dir.join(TRAIN_FILE))?;
    let test = Dataset::from_csv(data_dir.join(TEST_FILE))?;
    info!(train = train.len(), test = test.len(), "loaded prepared data");

    let model_type = config.describe();
    let trainer = GbdtTrainer::new(config);
    let model = trainer.train(&train)?;
    let model_hash = model.hash_hex()?;

    let (report, _) = evaluate(&model, &test, &model.split_importance());
    report.log();

    fs::create_dir_all(model_dir)?;
    model.save_json(model_dir.join(MODEL_FILE))?;
    fs::write(model_dir.join(MODEL_HASH_FILE), &model_hash)?;

    let metadata = ModelMetadata {
        model_type,
        model_hash: model_hash.clone(),
        feature_columns: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
        feature_info_fingerprint: feature_info.fingerprint()?,
        metrics: report.metrics.to_map(),
        trainer_version: crate::VERSION.to_string(),
        created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    };
    metadata.save(model_dir.join(MODEL_METADATA_FILE))?;
    write_importance(&model_dir.join(FEATURE_IMPORTANCE_FILE), &model)?;

    info!(
        model = %model_dir.join(MODEL_FILE).display(),
        hash = %model_hash,
        "training completed"
    );
    Ok(TrainingOutcome {
        model_hash,
        metadata,
    })
}

/// Score a saved model against the prepared test split and write the report.
pub fn evaluate_dir(model_dir: &Path, data_dir: &Path, output_dir: &Path) -> Result<EvaluationReport> {
    let model = load_model(model_dir)?;
    let feature_info = FeatureInfo::load(data_dir.join(FEATURE_INFO_FILE))?;
    let metadata_path = model_dir.join(MODEL_METADATA_FILE);
    if metadata_path.exists() {
        ModelMetadata::load(&metadata_path)?.verify_against(&feature_info)?;
    }

    let test = Dataset::from_csv(data_dir.join(TEST_FILE))?;
    let (report, predicted) = evaluate(&model, &test, &model.split_importance());
    report.log();
    write_report(output_dir, &report, &test.targets, &predicted)?;
    Ok(report)
}

/// Load `model.json`, checking it against `model.hash` when present.
pub fn load_model(model_dir: &Path) -> Result<PriceModel> {
    let model_path = model_dir.join(MODEL_FILE);
    let hash_path = model_dir.join(MODEL_HASH_FILE);
    let model = if hash_path.exists() {
        let expected = fs::read_to_string(&hash_path)?;
        PriceModel::load_verified(&model_path, &expected)?
    } else {
        PriceModel::load_json(&model_path)?
    };
    Ok(model)
}

fn write_importance(path: &Path, model: &PriceModel) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rank_importance(&model.split_importance()) {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
