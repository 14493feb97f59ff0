use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{rejection::{JsonRejection, PathRejection, QueryRejection}, Extension, Path, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::models::{DataPage, ExperimentData};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::DatasheetService;

use super::utils::filter_data_from_query;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDeleteRequest {
    pub data_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

/// POST /api/datasheet/experiment/:experiment_id/data - Validate and add one row
pub async fn add(
    Extension(service): Extension<DatasheetService>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<ExperimentData> {
    let Path(experiment_id) = path?;
    let Json(row) = payload?;
    let created = service.add_data(experiment_id, row).await?;
    Ok(ApiResponse::created(created))
}

/// GET /api/datasheet/experiment/:experiment_id/data - Filtered, sorted, paged rows
///
/// `page`, `limit`, `sortBy` and `sortOrder` control paging and order; every
/// other parameter is an equality filter on the row data.
pub async fn query(
    Extension(service): Extension<DatasheetService>,
    path: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> ApiResult<DataPage> {
    let Path(experiment_id) = path?;
    let Query(params) = query?;
    let filter_data = filter_data_from_query(params)?;
    let page = service.query_data(experiment_id, filter_data).await?;
    Ok(ApiResponse::success(page))
}

/// PUT /api/datasheet/experiment/:experiment_id/data/:data_id - Merge and re-validate
pub async fn update(
    Extension(service): Extension<DatasheetService>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<ExperimentData> {
    let Path((experiment_id, data_id)) = path?;
    let Json(patch) = payload?;
    let updated = service.update_data(experiment_id, data_id, patch).await?;
    Ok(ApiResponse::success(updated))
}

/// DELETE /api/datasheet/experiment/:experiment_id/data/:data_id
pub async fn delete(
    Extension(service): Extension<DatasheetService>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> ApiResult<Value> {
    let Path((experiment_id, data_id)) = path?;
    service.delete_data(experiment_id, data_id).await?;
    Ok(ApiResponse::success(json!({ "id": data_id, "deleted": true })))
}

/// POST /api/datasheet/experiment/:experiment_id/data/batch-import - JSON array of rows
pub async fn batch_import(
    Extension(service): Extension<DatasheetService>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<Vec<Value>>, JsonRejection>,
) -> ApiResult<Value> {
    let Path(experiment_id) = path?;
    let Json(rows) = payload?;
    let imported = service.batch_import_data(experiment_id, rows).await?;
    Ok(ApiResponse::created(json!({ "count": imported.len() })))
}

/// POST /api/datasheet/experiment/:experiment_id/data/batch-delete - `{ dataIds }`
pub async fn batch_delete(
    Extension(service): Extension<DatasheetService>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<BatchDeleteRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Path(experiment_id) = path?;
    let Json(request) = payload?;
    let count = service.batch_delete_data(experiment_id, &request.data_ids).await?;
    Ok(ApiResponse::success(json!({ "count": count })))
}

/// POST /api/datasheet/experiment/:experiment_id/import-csv - Raw CSV or XLSX body
///
/// XLSX is recognized by its zip signature; anything else is read as CSV.
pub async fn import_csv(
    Extension(service): Extension<DatasheetService>,
    path: Result<Path<Uuid>, PathRejection>,
    body: Bytes,
) -> ApiResult<Value> {
    let Path(experiment_id) = path?;
    let imported = service.import_from_spreadsheet(experiment_id, &body).await?;
    Ok(ApiResponse::created(json!({ "count": imported.len() })))
}

/// GET /api/datasheet/experiment/:experiment_id/data/export?format=csv - File download
pub async fn export(
    Extension(service): Extension<DatasheetService>,
    path: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<ExportQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Path(experiment_id) = path?;
    let Query(query) = query?;
    let format = query.format.unwrap_or_else(|| "csv".to_string());
    let file = service.export_data(experiment_id, &format).await?;

    let headers = [
        (header::CONTENT_TYPE, file.content_type.to_string()),
        (header::CONTENT_DISPOSITION, file.content_disposition()),
    ];
    Ok((StatusCode::OK, headers, file.body).into_response())
}
