use axum::extract::Extension;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::DatasheetService;

/// GET / - Service banner
pub async fn root() -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({
        "name": "Lab Datasheet API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Experiments with user-defined columns, validated rows, CSV import and export",
        "endpoints": {
            "health": "/health",
            "datasheet": "/api/datasheet/*"
        }
    })))
}

/// GET /health - Store connectivity
pub async fn health(Extension(service): Extension<DatasheetService>) -> ApiResult<Value> {
    let backend = service.store().backend();
    if let Err(e) = service.store().health_check().await {
        tracing::error!("Health check failed for {} store: {}", backend, e);
        return Err(ApiError::service_unavailable("Storage is unavailable"));
    }
    Ok(ApiResponse::success(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now(),
        "storage": backend
    })))
}
