//! HTTP surface tests, driven through the router without a socket

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use http_body_util::BodyExt;
use mhd_pricing_core::artifacts::{FEATURE_INFO_FILE, MODEL_METADATA_FILE};
use mhd_pricing_core::ModelMetadata;
use mhd_pricing_service::{build_router, AppState, PredictionService, ServiceConfig, ServingContext};
use mhd_pricing_trainer::pipeline::{generate_to, prepare_dir, train_dir};
use mhd_pricing_trainer::{GbdtConfig, PrepConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

fn midtown() -> Value {
    json!({
        "sqft": 1800,
        "beds": 3,
        "baths": 2,
        "year_built": 1995,
        "lot_size_acres": 0.25,
        "stories": 2,
        "garage_spaces": 2,
        "has_pool": false,
        "renovated": true,
        "neighborhood": "Midtown",
        "distance_to_downtown": 3.5,
        "crime_index": 0.3,
        "school_rating": 7,
        "property_type": "Single Family"
    })
}

fn router_for(context: ServingContext) -> Router {
    let service = PredictionService::new(Arc::new(context), 0.1);
    build_router(Arc::new(AppState::new(service)))
}

fn heuristic_router() -> Router {
    router_for(ServingContext::heuristic())
}

/// Train a small model on disk and return its serving config.
fn trained_workspace() -> (TempDir, ServiceConfig) {
    let dir = TempDir::new().unwrap();
    let raw = dir.path().join("raw.csv");
    let processed = dir.path().join("processed");
    let models = dir.path().join("models");

    let as_of = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
    generate_to(&raw, 200, 42, as_of).unwrap();
    prepare_dir(&raw, &processed, &PrepConfig::default()).unwrap();
    let config = GbdtConfig {
        num_trees: 10,
        max_depth: 3,
        ..GbdtConfig::default()
    };
    train_dir(&processed, &models, config).unwrap();

    let service_config = ServiceConfig {
        model_dir: models,
        feature_info_path: processed.join(FEATURE_INFO_FILE),
        ..ServiceConfig::default()
    };
    (dir, service_config)
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn get(router: Router, uri: &str) -> (StatusCode, Value) {
    send(router, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post(router: Router, uri: &str, payload: Value) -> (StatusCode, Value) {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    send(router, request).await
}

#[tokio::test]
async fn test_index_and_neighborhoods() {
    let (status, body) = get(heuristic_router(), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["health"], "/health");

    let (status, body) = get(heuristic_router(), "/neighborhoods").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 20);
    assert_eq!(body["neighborhoods"][0], "Downtown");
    assert_eq!(body["neighborhoods"][19], "Parkway Village");
}

#[tokio::test]
async fn test_health_reports_heuristic_mode() {
    let (status, body) = get(heuristic_router(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model_loaded"], false);
    assert_eq!(body["mode"], "heuristic");
    assert!(body["model_version"].is_null());
}

#[tokio::test]
async fn test_heuristic_prediction_is_labeled() {
    let (status, body) = post(heuristic_router(), "/predict", midtown()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "heuristic");
    assert_eq!(body["predicted_price"], 292_000.0);
    assert_eq!(body["confidence_range"]["low"], 262_000.0);
    assert_eq!(body["confidence_range"]["high"], 321_000.0);
    assert_eq!(body["features_used"]["neighborhood"], "Midtown");
    assert!(body["warning"].is_string());
}

#[tokio::test]
async fn test_out_of_range_request_is_422() {
    let mut payload = midtown();
    payload["sqft"] = json!(50);
    let (status, body) = post(heuristic_router(), "/predict", payload).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("sqft"));

    let mut payload = midtown();
    payload["neighborhood"] = json!("Atlantis");
    let (status, _) = post(heuristic_router(), "/predict", payload).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_malformed_body_returns_json_error() {
    let mut payload = midtown();
    payload.as_object_mut().unwrap().remove("beds");
    let (status, body) = post(heuristic_router(), "/predict", payload).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_batch_keeps_order_and_rejects_in_place() {
    let mut bad = midtown();
    bad["school_rating"] = json!(11);
    let payload = json!({ "properties": [midtown(), bad, midtown()] });

    let (status, body) = post(heuristic_router(), "/predict/batch", payload).await;
    assert_eq!(status, StatusCode::OK);
    let predictions = body["predictions"].as_array().unwrap();
    assert_eq!(predictions.len(), 3);
    assert_eq!(predictions[0]["mode"], "heuristic");
    assert!(predictions[1]["error"].as_str().unwrap().contains("school_rating"));
    assert_eq!(predictions[2]["predicted_price"], predictions[0]["predicted_price"]);
}

#[tokio::test]
async fn test_model_info_without_metadata() {
    let (status, body) = get(heuristic_router(), "/model/info").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "No model metadata available");
}

#[tokio::test]
async fn test_trained_model_serves_predictions() {
    let (_dir, config) = trained_workspace();
    let context = ServingContext::load(&config).unwrap();
    assert!(context.is_model_loaded());
    let metadata = ModelMetadata::load(config.model_dir.join(MODEL_METADATA_FILE)).unwrap();
    let router = router_for(context);

    let (status, body) = get(router.clone(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model_loaded"], true);
    assert_eq!(body["mode"], "model");
    assert_eq!(body["model_version"], metadata.model_hash.as_str());

    let (status, body) = post(router.clone(), "/predict", midtown()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "model");
    assert!(body.get("warning").is_none());
    let price = body["predicted_price"].as_f64().unwrap();
    assert!(price > 0.0);
    assert_eq!(price % 1000.0, 0.0);
    let low = body["confidence_range"]["low"].as_f64().unwrap();
    let high = body["confidence_range"]["high"].as_f64().unwrap();
    assert!(low <= price && price <= high);

    let (status, body) = get(router, "/model/info").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model_hash"], metadata.model_hash.as_str());
    assert_eq!(body["features"].as_array().unwrap().len(), 19);
    assert!(body["metrics"]["rmse"].is_number());
}

#[tokio::test]
async fn test_mismatched_feature_info_is_refused() {
    let (_dir, config) = trained_workspace();

    // Retrain the tables on a different sample so the fingerprint moves
    let other = TempDir::new().unwrap();
    let raw = other.path().join("raw.csv");
    let as_of = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
    generate_to(&raw, 150, 7, as_of).unwrap();
    prepare_dir(&raw, other.path(), &PrepConfig::default()).unwrap();

    let skewed = ServiceConfig {
        feature_info_path: other.path().join(FEATURE_INFO_FILE),
        ..config
    };
    assert!(ServingContext::load(&skewed).is_err());
}
