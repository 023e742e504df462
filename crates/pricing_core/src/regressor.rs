//! The seam between the feature pipeline and whatever model consumes it

use crate::schema::FeatureVector;

/// An opaque fitted regressor.
///
/// Implementations are immutable once loaded and are shared across
/// concurrent requests, hence `Send + Sync`.
pub trait Regressor: Send + Sync {
    /// Point estimate for one vector, in dollars.
    fn predict(&self, vector: &FeatureVector) -> f64;

    fn predict_batch(&self, vectors: &[FeatureVector]) -> Vec<f64> {
        vectors.iter().map(|v| self.predict(v)).collect()
    }

    /// Identifier reported by health endpoints.
    fn version(&self) -> Option<String> {
        None
    }
}
