//! HTTP surface over [`PredictionService`]

use crate::request::PropertyRequest;
use crate::service::{BatchItem, PredictionMode, PredictionResponse, PredictionService, ServiceStatsSnapshot};
use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use mhd_pricing_core::neighborhoods::neighborhood_names;
use mhd_pricing_core::PipelineError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub struct AppState {
    pub service: PredictionService,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(service: PredictionService) -> Self {
        Self {
            service,
            start_time: Instant::now(),
        }
    }

    fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

pub type SharedState = Arc<AppState>;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let status = if err.is_record_scoped() {
            StatusCode::UNPROCESSABLE_ENTITY
        } else {
            error!(error = %err, "prediction failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self::new(status, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, payload).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub model_version: Option<String>,
    pub mode: PredictionMode,
    pub uptime_secs: u64,
    pub stats: ServiceStatsSnapshot,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchRequest {
    pub properties: Vec<PropertyRequest>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchResponse {
    pub predictions: Vec<BatchItem>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelInfoResponse {
    pub model_type: String,
    pub model_hash: String,
    pub features: Vec<String>,
    pub metrics: BTreeMap<String, f64>,
    pub feature_info_fingerprint: String,
    pub trainer_version: String,
    pub created_at: String,
}

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/predict", post(handle_predict))
        .route("/predict/batch", post(handle_predict_batch))
        .route("/model/info", get(handle_model_info))
        .route("/neighborhoods", get(handle_neighborhoods))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until ctrl-c.
pub async fn start_server(state: SharedState, addr: SocketAddr) -> Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind listener on {addr}"))?;
    info!("Listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server terminated unexpectedly")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {}", err);
        return;
    }
    info!("Shutdown signal received");
}

async fn handle_index() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Memphis Housing Price Prediction API",
        "version": env!("CARGO_PKG_VERSION"),
        "health": "/health",
        "endpoints": ["/predict", "/predict/batch", "/model/info", "/neighborhoods"],
    }))
}

async fn handle_health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let context = state.service.context();
    let mode = if context.is_model_loaded() {
        PredictionMode::Model
    } else {
        PredictionMode::Heuristic
    };
    Json(HealthResponse {
        status: "healthy".to_string(),
        model_loaded: context.is_model_loaded(),
        model_version: context.model_version(),
        mode,
        uptime_secs: state.uptime_seconds(),
        stats: state.service.stats(),
    })
}

async fn handle_predict(
    State(state): State<SharedState>,
    payload: std::result::Result<Json<PropertyRequest>, JsonRejection>,
) -> std::result::Result<Json<PredictionResponse>, ApiError> {
    let Json(request) = payload?;
    Ok(Json(state.service.predict(&request)?))
}

async fn handle_predict_batch(
    State(state): State<SharedState>,
    payload: std::result::Result<Json<BatchRequest>, JsonRejection>,
) -> std::result::Result<Json<BatchResponse>, ApiError> {
    let Json(batch) = payload?;
    let predictions = state.service.predict_batch(&batch.properties)?;
    Ok(Json(BatchResponse { predictions }))
}

async fn handle_model_info(State(state): State<SharedState>) -> Response {
    match state.service.context().metadata() {
        Some(metadata) => Json(ModelInfoResponse {
            model_type: metadata.model_type.clone(),
            model_hash: metadata.model_hash.clone(),
            features: metadata.feature_columns.clone(),
            metrics: metadata.metrics.clone(),
            feature_info_fingerprint: metadata.feature_info_fingerprint.clone(),
            trainer_version: metadata.trainer_version.clone(),
            created_at: metadata.created_at.clone(),
        })
        .into_response(),
        None => Json(json!({ "status": "No model metadata available" })).into_response(),
    }
}

async fn handle_neighborhoods() -> Json<serde_json::Value> {
    let names = neighborhood_names();
    Json(json!({
        "count": names.len(),
        "neighborhoods": names,
    }))
}
