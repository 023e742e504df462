//! End-to-end tests for the offline pipeline
//!
//! generate -> prepare -> train -> evaluate on disk, then replay the raw
//! sales through the online transform and check it lands on the same vectors
//! and the same predictions.

use anyhow::Result;
use chrono::NaiveDate;
use mhd_pricing_core::artifacts::{FEATURE_INFO_FILE, MODEL_HASH_FILE, TEST_FILE, TRAIN_FILE};
use mhd_pricing_core::{vectorize, FeatureEngineer, FeatureInfo, Regressor};
use mhd_pricing_trainer::evaluate::PREDICTIONS_FILE;
use mhd_pricing_trainer::pipeline::{evaluate_dir, generate_to, load_model, prepare_dir, train_dir};
use mhd_pricing_trainer::{read_sales, Dataset, GbdtConfig, PrepConfig};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use tempfile::TempDir;

const SAMPLES: usize = 300;

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
}

fn quick_config() -> GbdtConfig {
    GbdtConfig {
        num_trees: 20,
        max_depth: 4,
        min_samples_leaf: 3,
        ..GbdtConfig::default()
    }
}

struct Workspace {
    _dir: TempDir,
    raw: std::path::PathBuf,
    processed: std::path::PathBuf,
    models: std::path::PathBuf,
    reports: std::path::PathBuf,
}

fn run_pipeline() -> Result<Workspace> {
    let dir = TempDir::new()?;
    let raw = dir.path().join("data/raw/memphis_housing.csv");
    let processed = dir.path().join("data/processed");
    let models = dir.path().join("models");
    let reports = dir.path().join("reports");

    let summary = generate_to(&raw, SAMPLES, 7, as_of())?;
    assert_eq!(summary.count, SAMPLES);

    prepare_dir(&raw, &processed, &PrepConfig::default())?;
    train_dir(&processed, &models, quick_config())?;
    evaluate_dir(&models, &processed, &reports)?;

    Ok(Workspace {
        _dir: dir,
        raw,
        processed,
        models,
        reports,
    })
}

#[derive(Debug, Deserialize)]
struct PredictionRow {
    actual: f64,
    predicted: f64,
}

#[test]
fn test_pipeline_produces_all_artifacts() -> Result<()> {
    let ws = run_pipeline()?;

    let train = Dataset::from_csv(ws.processed.join(TRAIN_FILE))?;
    let test = Dataset::from_csv(ws.processed.join(TEST_FILE))?;
    assert_eq!(train.len() + test.len(), SAMPLES);
    assert!((60..=61).contains(&test.len()));

    let info = FeatureInfo::load(ws.processed.join(FEATURE_INFO_FILE))?;
    assert_eq!(info.train_size, train.len());
    assert_eq!(info.test_size, test.len());

    assert!(ws.models.join(MODEL_HASH_FILE).exists());
    assert!(ws.reports.join(PREDICTIONS_FILE).exists());
    Ok(())
}

#[test]
fn test_online_transform_matches_offline_vectors() -> Result<()> {
    let ws = run_pipeline()?;

    let train = Dataset::from_csv(ws.processed.join(TRAIN_FILE))?;
    let test = Dataset::from_csv(ws.processed.join(TEST_FILE))?;
    let offline: HashSet<_> = train
        .rows
        .iter()
        .chain(&test.rows)
        .map(|row| row.to_bits())
        .collect();

    // Serving only ever sees the persisted tables
    let encoder = FeatureInfo::load(ws.processed.join(FEATURE_INFO_FILE))?.encoder()?;
    let engineer = FeatureEngineer::new();
    for record in read_sales(&ws.raw)? {
        let assembled = vectorize(&engineer, &encoder, &record)?;
        assert!(assembled.unseen.is_empty());
        assert!(offline.contains(&assembled.vector.to_bits()));
    }
    Ok(())
}

#[test]
fn test_reloaded_model_reproduces_offline_predictions() -> Result<()> {
    let ws = run_pipeline()?;

    let model = load_model(&ws.models)?;
    let test = Dataset::from_csv(ws.processed.join(TEST_FILE))?;

    let mut reader = csv::Reader::from_path(ws.reports.join(PREDICTIONS_FILE))?;
    let rows: Vec<PredictionRow> = reader.deserialize().collect::<Result<_, _>>()?;
    assert_eq!(rows.len(), test.len());

    for ((row, vector), target) in rows.iter().zip(&test.rows).zip(&test.targets) {
        assert_eq!(row.actual, *target);
        assert_eq!(row.predicted, model.predict(vector));
    }
    Ok(())
}

#[test]
fn test_model_beats_mean_baseline() -> Result<()> {
    let ws = run_pipeline()?;
    let report = evaluate_dir(&ws.models, &ws.processed, &ws.reports)?;

    assert!(report.metrics.r2 > 0.0, "r2 = {}", report.metrics.r2);
    assert!((60..=61).contains(&report.test_samples));
    assert!(report.model_hash.is_some());
    Ok(())
}

#[test]
fn test_tampered_model_is_rejected() -> Result<()> {
    let ws = run_pipeline()?;
    fs::write(ws.models.join(MODEL_HASH_FILE), "00".repeat(32))?;

    assert!(load_model(&ws.models).is_err());
    assert!(evaluate_dir(&ws.models, &ws.processed, &ws.reports).is_err());
    Ok(())
}

#[test]
fn test_pipeline_is_reproducible() -> Result<()> {
    let a = run_pipeline()?;
    let b = run_pipeline()?;

    let hash_a = fs::read_to_string(a.models.join(MODEL_HASH_FILE))?;
    let hash_b = fs::read_to_string(b.models.join(MODEL_HASH_FILE))?;
    assert_eq!(hash_a, hash_b);

    let info_a = FeatureInfo::load(a.processed.join(FEATURE_INFO_FILE))?;
    let info_b = FeatureInfo::load(b.processed.join(FEATURE_INFO_FILE))?;
    assert_eq!(info_a.fingerprint()?, info_b.fingerprint()?);
    Ok(())
}
