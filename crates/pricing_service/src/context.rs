//! Serving state, loaded once at startup and read-only afterwards

use crate::config::ServiceConfig;
use crate::errors::Result;
use mhd_pricing_core::artifacts::{MODEL_FILE, MODEL_HASH_FILE, MODEL_METADATA_FILE};
use mhd_pricing_core::{
    CategoricalEncoder, FeatureInfo, ModelMetadata, PipelineError, PriceModel, Regressor,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// A fitted regressor with the encoding tables it was trained against.
#[derive(Clone)]
pub struct LoadedModel {
    pub regressor: Arc<dyn Regressor>,
    pub encoder: CategoricalEncoder,
    pub metadata: Option<ModelMetadata>,
    /// Regressor version, read once at construction
    version: Option<String>,
}

impl LoadedModel {
    pub fn new(
        regressor: Arc<dyn Regressor>,
        encoder: CategoricalEncoder,
        metadata: Option<ModelMetadata>,
    ) -> Self {
        let version = regressor.version();
        Self {
            regressor,
            encoder,
            metadata,
            version,
        }
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel")
            .field("version", &self.version)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Everything a request handler may read. `None` means heuristic mode.
#[derive(Debug, Clone, Default)]
pub struct ServingContext {
    model: Option<LoadedModel>,
}

impl ServingContext {
    /// Context with no regressor; every prediction is a labeled heuristic.
    pub fn heuristic() -> Self {
        Self { model: None }
    }

    pub fn with_model(model: LoadedModel) -> Self {
        Self { model: Some(model) }
    }

    /// Load from disk according to `config`.
    ///
    /// A missing `model.json` is degraded mode. A model whose tables are
    /// missing, or were not the ones it was trained with, is a schema error.
    pub fn load(config: &ServiceConfig) -> Result<Self> {
        let model_path = config.model_dir.join(MODEL_FILE);
        if !model_path.exists() {
            warn!(
                path = %model_path.display(),
                "no model found, serving heuristic estimates"
            );
            return Ok(Self::heuristic());
        }

        if !config.feature_info_path.exists() {
            return Err(PipelineError::schema(format!(
                "model present but feature info {} is missing",
                config.feature_info_path.display()
            ))
            .into());
        }
        let feature_info = FeatureInfo::load(&config.feature_info_path)?;
        let encoder = feature_info.encoder()?;

        let model = load_price_model(&config.model_dir)?;

        let metadata_path = config.model_dir.join(MODEL_METADATA_FILE);
        let metadata = if metadata_path.exists() {
            let metadata = ModelMetadata::load(&metadata_path)?;
            metadata.verify_against(&feature_info)?;
            Some(metadata)
        } else {
            warn!("model metadata missing, feature_info pairing is unchecked");
            None
        };

        let trees = model.num_trees();
        let loaded = LoadedModel::new(Arc::new(model), encoder, metadata);
        info!(
            model = %model_path.display(),
            trees,
            version = loaded.version().unwrap_or("unknown"),
            "loaded price model"
        );

        Ok(Self::with_model(loaded))
    }

    pub fn model(&self) -> Option<&LoadedModel> {
        self.model.as_ref()
    }

    pub fn is_model_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// Model hash from metadata, else whatever the regressor reports.
    pub fn model_version(&self) -> Option<String> {
        let model = self.model.as_ref()?;
        model
            .metadata
            .as_ref()
            .map(|m| m.model_hash.clone())
            .or_else(|| model.version.clone())
    }

    pub fn metadata(&self) -> Option<&ModelMetadata> {
        self.model.as_ref().and_then(|m| m.metadata.as_ref())
    }
}

fn load_price_model(model_dir: &Path) -> Result<PriceModel> {
    let model_path = model_dir.join(MODEL_FILE);
    let hash_path = model_dir.join(MODEL_HASH_FILE);
    if hash_path.exists() {
        let expected = fs::read_to_string(&hash_path)?;
        Ok(PriceModel::load_verified(&model_path, &expected)?)
    } else {
        Ok(PriceModel::load_json(&model_path)?)
    }
}
