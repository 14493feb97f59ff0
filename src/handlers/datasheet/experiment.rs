use axum::{
    extract::{rejection::{JsonRejection, PathRejection, QueryRejection}, Extension, Path, Query},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::models::{Experiment, ExperimentDetails, ExperimentFilter, NewExperiment};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::DatasheetService;

use super::utils::non_empty;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Exact creator match
    pub creator: Option<String>,
    /// Case-insensitive substring of the experiment name
    pub name: Option<String>,
}

/// POST /api/datasheet/experiment - Create an experiment
pub async fn create(
    Extension(service): Extension<DatasheetService>,
    payload: Result<Json<NewExperiment>, JsonRejection>,
) -> ApiResult<Experiment> {
    let Json(input) = payload?;
    let experiment = service.create_experiment(input).await?;
    Ok(ApiResponse::created(experiment))
}

/// GET /api/datasheet/experiments - List experiments, newest first
pub async fn list(
    Extension(service): Extension<DatasheetService>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Vec<Experiment>> {
    let Query(query) = query?;
    let filter = ExperimentFilter {
        creator: non_empty(query.creator),
        name: non_empty(query.name),
    };
    let experiments = service.list_experiments(filter).await?;
    Ok(ApiResponse::success(experiments))
}

/// GET /api/datasheet/experiment/:experiment_id - Experiment with its columns
pub async fn get(
    Extension(service): Extension<DatasheetService>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<ExperimentDetails> {
    let Path(experiment_id) = path?;
    let details = service.get_experiment(experiment_id).await?;
    Ok(ApiResponse::success(details))
}

/// DELETE /api/datasheet/experiment/:experiment_id - Delete with columns and data
pub async fn delete(
    Extension(service): Extension<DatasheetService>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Value> {
    let Path(experiment_id) = path?;
    service.delete_experiment(experiment_id).await?;
    Ok(ApiResponse::success(json!({ "id": experiment_id, "deleted": true })))
}
