use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post, put},
    Extension, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::CONFIG;
use crate::handlers::{datasheet, health};
use crate::services::DatasheetService;

/// Full application router with shared middleware
pub fn app(service: DatasheetService) -> Router {
    let router = Router::new()
        // Public
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .merge(experiment_routes())
        .merge(column_routes())
        .merge(data_routes())
        // Global middleware
        .layer(Extension(service))
        .layer(DefaultBodyLimit::max(CONFIG.api.max_request_size_bytes));

    let router = if CONFIG.security.enable_cors {
        router.layer(cors_layer())
    } else {
        router
    };

    if CONFIG.api.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

fn experiment_routes() -> Router {
    Router::new()
        .route("/api/datasheet/experiment", post(datasheet::experiment_create))
        .route("/api/datasheet/experiments", get(datasheet::experiment_list))
        .route(
            "/api/datasheet/experiment/:experiment_id",
            get(datasheet::experiment_get).delete(datasheet::experiment_delete),
        )
}

fn column_routes() -> Router {
    Router::new()
        .route(
            "/api/datasheet/experiment/:experiment_id/columns",
            post(datasheet::columns_add),
        )
        .route(
            "/api/datasheet/experiment/:experiment_id/column/:column_id",
            put(datasheet::column_update).delete(datasheet::column_delete),
        )
}

fn data_routes() -> Router {
    Router::new()
        // Collection-level operations
        .route(
            "/api/datasheet/experiment/:experiment_id/data",
            get(datasheet::data_query).post(datasheet::data_add),
        )
        .route(
            "/api/datasheet/experiment/:experiment_id/data/batch-import",
            post(datasheet::data_batch_import),
        )
        .route(
            "/api/datasheet/experiment/:experiment_id/data/batch-delete",
            post(datasheet::data_batch_delete),
        )
        .route(
            "/api/datasheet/experiment/:experiment_id/data/export",
            get(datasheet::data_export),
        )
        .route(
            "/api/datasheet/experiment/:experiment_id/import-csv",
            post(datasheet::data_import_csv),
        )
        // Record-level operations
        .route(
            "/api/datasheet/experiment/:experiment_id/data/:data_id",
            put(datasheet::data_update).delete(datasheet::data_delete),
        )
}

/// Configured origins, or permissive when none parse
fn cors_layer() -> CorsLayer {
    let origins: Vec<HeaderValue> = CONFIG
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if origins.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any)
    }
}
