//! MHD Pricing Service - the online half of the valuation pipeline
//!
//! Loads the model and its encoding tables once at startup and serves
//! read-only predictions over HTTP. Without a model every response is a
//! heuristic estimate, labeled as such.

pub mod api;
pub mod config;
pub mod context;
pub mod errors;
pub mod request;
pub mod service;

pub use api::{build_router, start_server, AppState, SharedState};
pub use config::ServiceConfig;
pub use context::{LoadedModel, ServingContext};
pub use errors::{Result, ServiceError};
pub use request::PropertyRequest;
pub use service::{
    BatchItem, ConfidenceRange, PredictionMode, PredictionResponse, PredictionService,
};
