//! Axum HTTP API server.
//!
//! This crate provides:
//! - Image and video prediction endpoints mirroring the classic API shape
//! - Once-loaded, read-only model state shared across requests
//! - CORS, request-id and request-logging middleware
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::{AppState, ModelBundle};
