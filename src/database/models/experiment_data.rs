use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{postgres::PgRow, FromRow, Row};
use uuid::Uuid;

/// Weakly typed row payload, keyed by canonical field name
pub type RowData = Map<String, Value>;

/// One stored datasheet row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentData {
    pub id: Uuid,
    pub experiment_id: Uuid,
    pub data: RowData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExperimentData {
    pub fn new(experiment_id: Uuid, data: RowData, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            experiment_id,
            data,
            created_at: now,
            updated_at: now,
        }
    }
}

impl<'r> FromRow<'r, PgRow> for ExperimentData {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let data = match row.try_get::<Value, _>("data")? {
            Value::Object(map) => map,
            other => {
                return Err(sqlx::Error::ColumnDecode {
                    index: "data".to_string(),
                    source: format!("expected JSON object, got {}", other).into(),
                })
            }
        };

        Ok(Self {
            id: row.try_get("id")?,
            experiment_id: row.try_get("experiment_id")?,
            data,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// One page of query results
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPage {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
    pub data: Vec<ExperimentData>,
}

impl DataPage {
    pub fn new(total: u64, page: u32, limit: u32, data: Vec<ExperimentData>) -> Self {
        let total_pages = if limit == 0 { 0 } else { total.div_ceil(limit as u64) };
        Self { total, page, limit, total_pages, data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(DataPage::new(0, 1, 10, vec![]).total_pages, 0);
        assert_eq!(DataPage::new(10, 1, 10, vec![]).total_pages, 1);
        assert_eq!(DataPage::new(11, 1, 10, vec![]).total_pages, 2);
    }
}
