//! Prediction service
//!
//! Stateless over a shared [`ServingContext`]: each call validates, runs the
//! shared transform and scores, touching nothing but atomic counters.

use crate::context::ServingContext;
use crate::request::PropertyRequest;
use mhd_pricing_core::{
    vectorize, FeatureEngineer, FeatureVector, PipelineError, RawPropertyRecord, Regressor, Result,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Dollars per square foot used by the heuristic estimate.
pub const HEURISTIC_PRICE_PER_SQFT: f64 = 120.0;
/// Uplift per school-rating point in the heuristic estimate.
pub const HEURISTIC_SCHOOL_UPLIFT: f64 = 0.05;

pub const HEURISTIC_WARNING: &str =
    "no model loaded: heuristic estimate from square footage and school rating";

/// How a prediction was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionMode {
    Model,
    Heuristic,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceRange {
    pub low: f64,
    pub high: f64,
}

/// Echo of the key inputs behind a prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturesUsed {
    pub sqft: u32,
    pub beds: u32,
    pub baths: f64,
    pub neighborhood: String,
    pub year_built: i32,
}

impl From<&RawPropertyRecord> for FeaturesUsed {
    fn from(record: &RawPropertyRecord) -> Self {
        Self {
            sqft: record.sqft,
            beds: record.beds,
            baths: record.baths,
            neighborhood: record.neighborhood.clone(),
            year_built: record.year_built,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub predicted_price: f64,
    pub confidence_range: ConfidenceRange,
    pub features_used: FeaturesUsed,
    pub mode: PredictionMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// Categorical columns that fell back to the unseen code
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unseen_categories: Vec<String>,
}

/// One entry of a batch response: a prediction or the reason it was rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchItem {
    Prediction(PredictionResponse),
    Rejected { error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatsSnapshot {
    pub predictions: u64,
    pub heuristic_predictions: u64,
    pub rejected: u64,
    pub unseen_categories: u64,
}

#[derive(Debug, Default)]
struct ServiceStats {
    predictions: AtomicU64,
    heuristic_predictions: AtomicU64,
    rejected: AtomicU64,
    unseen_categories: AtomicU64,
}

impl ServiceStats {
    fn on_prediction(&self, mode: PredictionMode) {
        self.predictions.fetch_add(1, Ordering::Relaxed);
        if mode == PredictionMode::Heuristic {
            self.heuristic_predictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn on_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    fn on_unseen(&self, count: usize) {
        self.unseen_categories.fetch_add(count as u64, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ServiceStatsSnapshot {
        ServiceStatsSnapshot {
            predictions: self.predictions.load(Ordering::Relaxed),
            heuristic_predictions: self.heuristic_predictions.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            unseen_categories: self.unseen_categories.load(Ordering::Relaxed),
        }
    }
}

/// Round to the nearest thousand dollars.
pub fn round_to_thousand(value: f64) -> f64 {
    (value / 1000.0).round() * 1000.0
}

/// Symmetric band of `fraction` around `price`, bounds rounded to 1000.
pub fn confidence_band(price: f64, fraction: f64) -> ConfidenceRange {
    ConfidenceRange {
        low: round_to_thousand(price * (1.0 - fraction)),
        high: round_to_thousand(price * (1.0 + fraction)),
    }
}

/// Degraded-mode estimate: `sqft * 120 * (1 + school_rating * 0.05)`.
pub fn heuristic_price(record: &RawPropertyRecord) -> f64 {
    f64::from(record.sqft)
        * HEURISTIC_PRICE_PER_SQFT
        * (1.0 + f64::from(record.school_rating) * HEURISTIC_SCHOOL_UPLIFT)
}

pub struct PredictionService {
    context: Arc<ServingContext>,
    engineer: FeatureEngineer,
    band_fraction: f64,
    stats: ServiceStats,
}

impl PredictionService {
    pub fn new(context: Arc<ServingContext>, band_fraction: f64) -> Self {
        Self {
            context,
            engineer: FeatureEngineer::new(),
            band_fraction,
            stats: ServiceStats::default(),
        }
    }

    pub fn context(&self) -> &ServingContext {
        &self.context
    }

    pub fn band_fraction(&self) -> f64 {
        self.band_fraction
    }

    pub fn stats(&self) -> ServiceStatsSnapshot {
        self.stats.snapshot()
    }

    /// Point estimate for an already-built vector.
    pub fn predict_vector(regressor: &dyn Regressor, vector: &FeatureVector) -> f64 {
        regressor.predict(vector)
    }

    /// Validate a request and price it.
    pub fn predict(&self, request: &PropertyRequest) -> Result<PredictionResponse> {
        let record = request.to_record().map_err(|err| {
            self.stats.on_rejected();
            err
        })?;
        self.predict_record(&record)
    }

    /// Price a validated record.
    ///
    /// With a model loaded this is the shared transform plus the regressor;
    /// without one it is the heuristic, flagged as such.
    pub fn predict_record(&self, record: &RawPropertyRecord) -> Result<PredictionResponse> {
        let (price, mode, unseen_categories) = match self.context.model() {
            Some(model) => {
                let assembled = vectorize(&self.engineer, &model.encoder, record)?;
                if !assembled.unseen.is_empty() {
                    self.stats.on_unseen(assembled.unseen.len());
                }
                let price = Self::predict_vector(model.regressor.as_ref(), &assembled.vector);
                if !price.is_finite() {
                    return Err(PipelineError::schema(format!(
                        "regressor returned non-finite price {price}"
                    )));
                }
                let unseen = assembled.unseen.iter().map(|c| c.name().to_string()).collect();
                (price, PredictionMode::Model, unseen)
            }
            None => (heuristic_price(record), PredictionMode::Heuristic, Vec::new()),
        };

        self.stats.on_prediction(mode);
        debug!(
            neighborhood = %record.neighborhood,
            price,
            mode = ?mode,
            "priced record"
        );

        Ok(PredictionResponse {
            predicted_price: round_to_thousand(price),
            confidence_range: confidence_band(price, self.band_fraction),
            features_used: FeaturesUsed::from(record),
            mode,
            warning: (mode == PredictionMode::Heuristic).then(|| HEURISTIC_WARNING.to_string()),
            unseen_categories,
        })
    }

    /// Price a batch. Invalid entries are rejected in place; a schema error
    /// fails the whole batch.
    pub fn predict_batch(&self, requests: &[PropertyRequest]) -> Result<Vec<BatchItem>> {
        let mut items = Vec::with_capacity(requests.len());
        for (i, request) in requests.iter().enumerate() {
            match self.predict(request) {
                Ok(prediction) => items.push(BatchItem::Prediction(prediction)),
                Err(err) if err.is_record_scoped() => {
                    warn!(index = i, error = %err, "rejected batch entry");
                    items.push(BatchItem::Rejected {
                        error: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }
        Ok(items)
    }
}
