//! Hold-out evaluation: regression metrics, price-range breakdown and error analysis

use crate::dataset::Dataset;
use crate::errors::Result;
use mhd_pricing_core::serde_canon::to_canonical_json_pretty;
use mhd_pricing_core::{Regressor, FEATURE_COLUMNS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

pub const EVALUATION_REPORT_FILE: &str = "evaluation_report.json";
pub const PREDICTIONS_FILE: &str = "predictions.csv";

/// Errors above this share of the actual price count as large.
pub const LARGE_ERROR_PCT: f64 = 25.0;
const WORST_PREDICTIONS: usize = 5;

/// Upper bounds (inclusive) and labels of the price-range buckets.
const PRICE_RANGES: [(f64, &str); 5] = [
    (100_000.0, "<$100K"),
    (200_000.0, "$100K-$200K"),
    (300_000.0, "$200K-$300K"),
    (500_000.0, "$300K-$500K"),
    (f64::INFINITY, ">$500K"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
    pub mape: f64,
    pub median_ae: f64,
    pub max_error: f64,
    pub within_5pct: f64,
    pub within_10pct: f64,
    pub within_20pct: f64,
}

impl RegressionMetrics {
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Self {
        let n = actual.len().min(predicted.len());
        if n == 0 {
            return Self {
                rmse: 0.0,
                mae: 0.0,
                r2: 0.0,
                mape: 0.0,
                median_ae: 0.0,
                max_error: 0.0,
                within_5pct: 0.0,
                within_10pct: 0.0,
                within_20pct: 0.0,
            };
        }
        let abs_errors: Vec<f64> = actual
            .iter()
            .zip(predicted)
            .map(|(a, p)| (a - p).abs())
            .collect();
        let pct = pct_errors(actual, predicted);

        let mean_actual = actual.iter().take(n).sum::<f64>() / n as f64;
        let ss_res: f64 = abs_errors.iter().map(|e| e * e).sum();
        let ss_tot: f64 = actual.iter().take(n).map(|a| (a - mean_actual).powi(2)).sum();

        Self {
            rmse: (ss_res / n as f64).sqrt(),
            mae: mean(&abs_errors),
            r2: if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 },
            mape: mean(&pct),
            median_ae: median(&abs_errors),
            max_error: abs_errors.iter().copied().fold(0.0, f64::max),
            within_5pct: share_pct(&pct, |e| e <= 5.0),
            within_10pct: share_pct(&pct, |e| e <= 10.0),
            within_20pct: share_pct(&pct, |e| e <= 20.0),
        }
    }

    /// Flattened for model metadata.
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        [
            ("rmse", self.rmse),
            ("mae", self.mae),
            ("r2", self.r2),
            ("mape", self.mape),
            ("median_ae", self.median_ae),
            ("max_error", self.max_error),
            ("within_5pct", self.within_5pct),
            ("within_10pct", self.within_10pct),
            ("within_20pct", self.within_20pct),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRangeSummary {
    pub price_range: String,
    pub count: usize,
    pub avg_price: f64,
    pub mae: f64,
    pub median_ae: f64,
    pub mape: f64,
    pub median_pct_error: f64,
}

/// Per-bucket performance; empty buckets are omitted.
pub fn analyze_by_price_range(actual: &[f64], predicted: &[f64]) -> Vec<PriceRangeSummary> {
    let mut lower = 0.0;
    let mut summaries = Vec::new();
    for (upper, label) in PRICE_RANGES {
        let (bucket_actual, bucket_pred): (Vec<f64>, Vec<f64>) = actual
            .iter()
            .zip(predicted)
            .filter(|(a, _)| **a > lower && **a <= upper)
            .map(|(a, p)| (*a, *p))
            .unzip();
        lower = upper;
        if bucket_actual.is_empty() {
            continue;
        }
        let abs_errors: Vec<f64> = bucket_actual
            .iter()
            .zip(&bucket_pred)
            .map(|(a, p)| (a - p).abs())
            .collect();
        let pct = pct_errors(&bucket_actual, &bucket_pred);
        summaries.push(PriceRangeSummary {
            price_range: label.to_string(),
            count: bucket_actual.len(),
            avg_price: round2(mean(&bucket_actual)),
            mae: round2(mean(&abs_errors)),
            median_ae: round2(median(&abs_errors)),
            mape: round2(mean(&pct)),
            median_pct_error: round2(median(&pct)),
        });
    }
    summaries
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorstPrediction {
    pub actual: f64,
    pub predicted: f64,
    pub pct_error: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorAnalysis {
    /// Mean signed error (bias)
    pub mean_error: f64,
    pub std_error: f64,
    pub skew: f64,
    pub overpredict_rate: f64,
    pub underpredict_rate: f64,
    pub large_error_rate: f64,
    pub worst_predictions: Vec<WorstPrediction>,
}

pub fn analyze_errors(actual: &[f64], predicted: &[f64]) -> ErrorAnalysis {
    let errors: Vec<f64> = predicted.iter().zip(actual).map(|(p, a)| p - a).collect();
    let pct = pct_errors(actual, predicted);

    let mean_error = mean(&errors);
    let std_error = if errors.is_empty() {
        0.0
    } else {
        (errors.iter().map(|e| (e - mean_error).powi(2)).sum::<f64>() / errors.len() as f64).sqrt()
    };

    let mut ranked: Vec<usize> = (0..pct.len()).collect();
    // Highest error first; index breaks ties
    ranked.sort_by(|&a, &b| pct[b].total_cmp(&pct[a]).then(a.cmp(&b)));
    let worst_predictions = ranked
        .into_iter()
        .take(WORST_PREDICTIONS)
        .map(|i| WorstPrediction {
            actual: actual[i],
            predicted: predicted[i],
            pct_error: pct[i],
        })
        .collect();

    ErrorAnalysis {
        mean_error,
        std_error,
        skew: sample_skew(&errors),
        overpredict_rate: share_pct(&errors, |e| e > 0.0),
        underpredict_rate: share_pct(&errors, |e| e < 0.0),
        large_error_rate: share_pct(&pct, |e| e > LARGE_ERROR_PCT),
        worst_predictions,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Pair importances with column names, most important first.
pub fn rank_importance(importance: &[f64]) -> Vec<FeatureImportance> {
    let mut ranked: Vec<FeatureImportance> = FEATURE_COLUMNS
        .iter()
        .zip(importance)
        .map(|(name, &importance)| FeatureImportance {
            feature: name.to_string(),
            importance,
        })
        .collect();
    // Stable sort keeps schema order among equal importances
    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    ranked
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub model_hash: Option<String>,
    pub metrics: RegressionMetrics,
    pub price_range_analysis: Vec<PriceRangeSummary>,
    pub error_analysis: ErrorAnalysis,
    pub feature_importance: Vec<FeatureImportance>,
    pub test_samples: usize,
}

/// Score the hold-out split.
pub fn evaluate(
    model: &dyn Regressor,
    test: &Dataset,
    importance: &[f64],
) -> (EvaluationReport, Vec<f64>) {
    let predicted = model.predict_batch(&test.rows);
    let actual = &test.targets;
    let report = EvaluationReport {
        model_hash: model.version(),
        metrics: RegressionMetrics::compute(actual, &predicted),
        price_range_analysis: analyze_by_price_range(actual, &predicted),
        error_analysis: analyze_errors(actual, &predicted),
        feature_importance: rank_importance(importance),
        test_samples: test.len(),
    };
    (report, predicted)
}

impl EvaluationReport {
    pub fn log(&self) {
        let m = &self.metrics;
        info!("Overall performance on {} samples", self.test_samples);
        info!("  RMSE:       ${:.0}", m.rmse);
        info!("  MAE:        ${:.0}", m.mae);
        info!("  Median AE:  ${:.0}", m.median_ae);
        info!("  R²:         {:.4}", m.r2);
        info!("  MAPE:       {:.2}%", m.mape);
        info!("  Max error:  ${:.0}", m.max_error);
        info!(
            "  Within 5% / 10% / 20%: {:.1}% / {:.1}% / {:.1}%",
            m.within_5pct, m.within_10pct, m.within_20pct
        );
        for range in &self.price_range_analysis {
            info!(
                "  {:<12} n={:<5} mae=${:.0} mape={:.2}%",
                range.price_range, range.count, range.mae, range.mape
            );
        }
        let e = &self.error_analysis;
        info!(
            "  Bias ${:.0}, std ${:.0}, over {:.1}%, under {:.1}%, large {:.1}%",
            e.mean_error, e.std_error, e.overpredict_rate, e.underpredict_rate, e.large_error_rate
        );
        for top in self.feature_importance.iter().take(10) {
            info!("  {:<25} {:.4}", top.feature, top.importance);
        }
    }
}

#[derive(Debug, Serialize)]
struct PredictionRow {
    actual: f64,
    predicted: f64,
    error: f64,
    pct_error: f64,
}

/// Write `evaluation_report.json` and `predictions.csv` into `dir`.
pub fn write_report<P: AsRef<Path>>(
    dir: P,
    report: &EvaluationReport,
    actual: &[f64],
    predicted: &[f64],
) -> Result<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    fs::write(dir.join(EVALUATION_REPORT_FILE), to_canonical_json_pretty(report)?)?;

    let mut writer = csv::Writer::from_path(dir.join(PREDICTIONS_FILE))?;
    for (&a, &p) in actual.iter().zip(predicted) {
        writer.serialize(PredictionRow {
            actual: a,
            predicted: p,
            error: p - a,
            pct_error: pct_error(a, p),
        })?;
    }
    writer.flush()?;
    info!(dir = %dir.display(), "wrote evaluation report");
    Ok(())
}

fn pct_error(actual: f64, predicted: f64) -> f64 {
    if actual == 0.0 {
        return 0.0;
    }
    (predicted - actual).abs() / actual.abs() * 100.0
}

fn pct_errors(actual: &[f64], predicted: &[f64]) -> Vec<f64> {
    actual
        .iter()
        .zip(predicted)
        .map(|(&a, &p)| pct_error(a, p))
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn share_pct(values: &[f64], predicate: impl Fn(f64) -> bool) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().filter(|&&v| predicate(v)).count() as f64 / values.len() as f64 * 100.0
}

/// Adjusted Fisher-Pearson sample skewness.
fn sample_skew(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 3 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64;
    let sd = var.sqrt();
    if sd == 0.0 {
        return 0.0;
    }
    let nf = n as f64;
    let cubed: f64 = values.iter().map(|v| ((v - m) / sd).powi(3)).sum();
    nf / ((nf - 1.0) * (nf - 2.0)) * cubed
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
