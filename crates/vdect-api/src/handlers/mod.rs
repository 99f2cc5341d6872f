//! Request handlers.

pub mod predict;

use axum::Json;
use serde_json::{json, Value};

/// Health check.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Readiness check.
pub async fn ready() -> Json<Value> {
    Json(json!({ "status": "ready" }))
}
