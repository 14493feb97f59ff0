use axum::{
    extract::{rejection::{JsonRejection, PathRejection}, Extension, Path},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::models::{ColumnDefinition, ColumnUpdate, NewColumn};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::DatasheetService;

#[derive(Debug, Deserialize)]
pub struct AddColumnsRequest {
    pub columns: Vec<NewColumn>,
}

/// POST /api/datasheet/experiment/:experiment_id/columns - Add columns as one batch
pub async fn add(
    Extension(service): Extension<DatasheetService>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<AddColumnsRequest>, JsonRejection>,
) -> ApiResult<Vec<ColumnDefinition>> {
    let Path(experiment_id) = path?;
    let Json(request) = payload?;
    let columns = service.add_columns(experiment_id, request.columns).await?;
    Ok(ApiResponse::created(columns))
}

/// PUT /api/datasheet/experiment/:experiment_id/column/:column_id - Partial update
pub async fn update(
    Extension(service): Extension<DatasheetService>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
    payload: Result<Json<ColumnUpdate>, JsonRejection>,
) -> ApiResult<ColumnDefinition> {
    let Path((experiment_id, column_id)) = path?;
    let Json(updates) = payload?;
    let column = service.update_column(experiment_id, column_id, updates).await?;
    Ok(ApiResponse::success(column))
}

/// DELETE /api/datasheet/experiment/:experiment_id/column/:column_id
///
/// Stored rows keep the deleted field's values.
pub async fn delete(
    Extension(service): Extension<DatasheetService>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> ApiResult<Value> {
    let Path((experiment_id, column_id)) = path?;
    service.delete_column(experiment_id, column_id).await?;
    Ok(ApiResponse::success(json!({ "id": column_id, "deleted": true })))
}
