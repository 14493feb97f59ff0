use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgArguments, PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use super::manager::DatabaseManager;
use super::models::{ColumnDefinition, Experiment, ExperimentData, ExperimentFilter};
use crate::config::CONFIG;
use crate::datasheet::{DatasheetError, DatasheetResult, DatasheetStore, StoreRead, StoreTx};
use crate::filter::Filter;

const EXPERIMENT_COLUMNS: &str =
    r#""id", "name", "description", "creator", "created_at", "updated_at""#;

const COLUMN_COLUMNS: &str = r#""id", "experiment_id", "field_name", "display_name", "data_type", "is_required", "constraints", "created_at", "updated_at""#;

const DATA_COLUMNS: &str = r#""id", "experiment_id", "data", "created_at", "updated_at""#;

/// Postgres-backed datasheet store
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DatasheetStore for PgStore {
    async fn begin(&self) -> DatasheetResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    /// Reads run in their own transaction, which is rolled back on drop
    async fn snapshot(&self) -> DatasheetResult<Box<dyn StoreRead>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn health_check(&self) -> DatasheetResult<()> {
        DatabaseManager::health_check(&self.pool).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

struct PgTx {
    tx: Transaction<'static, Postgres>,
}

fn log_sql(sql: &str) {
    if CONFIG.database.enable_query_logging {
        tracing::debug!("SQL: {}", sql);
    }
}

/// `%`, `_` and `\` are literal inside the ILIKE pattern
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[async_trait]
impl StoreRead for PgTx {
    async fn find_experiment(&mut self, id: Uuid) -> DatasheetResult<Option<Experiment>> {
        let sql = format!(r#"SELECT {} FROM "experiments" WHERE "id" = $1"#, EXPERIMENT_COLUMNS);
        log_sql(&sql);
        let experiment = sqlx::query_as::<_, Experiment>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(experiment)
    }

    async fn list_experiments(&mut self, filter: &ExperimentFilter) -> DatasheetResult<Vec<Experiment>> {
        let mut conditions = vec!["TRUE".to_string()];
        let mut params: Vec<String> = vec![];
        if let Some(creator) = &filter.creator {
            params.push(creator.clone());
            conditions.push(format!(r#""creator" = ${}"#, params.len()));
        }
        if let Some(name) = &filter.name {
            params.push(like_pattern(name));
            conditions.push(format!(r#""name" ILIKE ${}"#, params.len()));
        }

        let sql = format!(
            r#"SELECT {} FROM "experiments" WHERE {} ORDER BY "created_at" DESC"#,
            EXPERIMENT_COLUMNS,
            conditions.join(" AND ")
        );
        log_sql(&sql);
        let mut q = sqlx::query_as::<_, Experiment>(&sql);
        for p in params {
            q = q.bind(p);
        }
        Ok(q.fetch_all(&mut *self.tx).await?)
    }

    async fn list_columns(&mut self, experiment_id: Uuid) -> DatasheetResult<Vec<ColumnDefinition>> {
        let sql = format!(
            r#"SELECT {} FROM "column_definitions" WHERE "experiment_id" = $1 ORDER BY "created_at" ASC, "seq" ASC"#,
            COLUMN_COLUMNS
        );
        log_sql(&sql);
        let columns = sqlx::query_as::<_, ColumnDefinition>(&sql)
            .bind(experiment_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(columns)
    }

    async fn find_column(
        &mut self,
        experiment_id: Uuid,
        column_id: Uuid,
    ) -> DatasheetResult<Option<ColumnDefinition>> {
        let sql = format!(
            r#"SELECT {} FROM "column_definitions" WHERE "id" = $1 AND "experiment_id" = $2"#,
            COLUMN_COLUMNS
        );
        log_sql(&sql);
        let column = sqlx::query_as::<_, ColumnDefinition>(&sql)
            .bind(column_id)
            .bind(experiment_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(column)
    }

    async fn find_row(&mut self, experiment_id: Uuid, data_id: Uuid) -> DatasheetResult<Option<ExperimentData>> {
        let sql = format!(
            r#"SELECT {} FROM "experiment_data" WHERE "id" = $1 AND "experiment_id" = $2"#,
            DATA_COLUMNS
        );
        log_sql(&sql);
        let row = sqlx::query_as::<_, ExperimentData>(&sql)
            .bind(data_id)
            .bind(experiment_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn query_rows(
        &mut self,
        experiment_id: Uuid,
        filter: &Filter,
    ) -> DatasheetResult<(u64, Vec<ExperimentData>)> {
        let count_sql = filter.to_count_sql(experiment_id);
        log_sql(&count_sql.query);
        let mut q = sqlx::query(&count_sql.query);
        for p in count_sql.params.iter() {
            q = bind_param(q, p);
        }
        let row = q
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| DatasheetError::QueryFailed(e.to_string()))?;
        let total: i64 = row
            .try_get("count")
            .map_err(|e| DatasheetError::QueryFailed(e.to_string()))?;

        let page_sql = filter.to_sql(experiment_id);
        log_sql(&page_sql.query);
        let mut q = sqlx::query_as::<_, ExperimentData>(&page_sql.query);
        for p in page_sql.params.iter() {
            q = bind_param_query_as(q, p);
        }
        let rows = q
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| DatasheetError::QueryFailed(e.to_string()))?;

        Ok((total.max(0) as u64, rows))
    }

    async fn list_rows_for_export(&mut self, experiment_id: Uuid) -> DatasheetResult<Vec<ExperimentData>> {
        let sql = format!(
            r#"SELECT {} FROM "experiment_data" WHERE "experiment_id" = $1 ORDER BY "created_at" DESC, "seq" DESC"#,
            DATA_COLUMNS
        );
        log_sql(&sql);
        let rows = sqlx::query_as::<_, ExperimentData>(&sql)
            .bind(experiment_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows)
    }
}

#[async_trait]
impl StoreTx for PgTx {
    async fn insert_experiment(&mut self, experiment: &Experiment) -> DatasheetResult<()> {
        let sql = format!(
            r#"INSERT INTO "experiments" ({}) VALUES ($1, $2, $3, $4, $5, $6)"#,
            EXPERIMENT_COLUMNS
        );
        log_sql(&sql);
        sqlx::query(&sql)
            .bind(experiment.id)
            .bind(&experiment.name)
            .bind(&experiment.description)
            .bind(&experiment.creator)
            .bind(experiment.created_at)
            .bind(experiment.updated_at)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn delete_experiment(&mut self, id: Uuid) -> DatasheetResult<u64> {
        let deleted = sqlx::query(r#"DELETE FROM "experiments" WHERE "id" = $1"#)
            .bind(id)
            .execute(&mut *self.tx)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Ok(0);
        }

        sqlx::query(r#"DELETE FROM "column_definitions" WHERE "experiment_id" = $1"#)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        sqlx::query(r#"DELETE FROM "experiment_data" WHERE "experiment_id" = $1"#)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(deleted)
    }

    async fn insert_columns(&mut self, columns: &[ColumnDefinition]) -> DatasheetResult<()> {
        let sql = format!(
            r#"INSERT INTO "column_definitions" ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
            COLUMN_COLUMNS
        );
        log_sql(&sql);
        for column in columns {
            sqlx::query(&sql)
                .bind(column.id)
                .bind(column.experiment_id)
                .bind(&column.field_name)
                .bind(&column.display_name)
                .bind(column.data_type.as_str())
                .bind(column.is_required)
                .bind(&column.constraints)
                .bind(column.created_at)
                .bind(column.updated_at)
                .execute(&mut *self.tx)
                .await?;
        }
        Ok(())
    }

    async fn save_column(&mut self, column: &ColumnDefinition) -> DatasheetResult<()> {
        let sql = r#"UPDATE "column_definitions"
            SET "field_name" = $2, "display_name" = $3, "data_type" = $4,
                "is_required" = $5, "constraints" = $6, "updated_at" = $7
            WHERE "id" = $1"#;
        log_sql(sql);
        sqlx::query(sql)
            .bind(column.id)
            .bind(&column.field_name)
            .bind(&column.display_name)
            .bind(column.data_type.as_str())
            .bind(column.is_required)
            .bind(&column.constraints)
            .bind(column.updated_at)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn delete_column(&mut self, experiment_id: Uuid, column_id: Uuid) -> DatasheetResult<u64> {
        let result = sqlx::query(
            r#"DELETE FROM "column_definitions" WHERE "id" = $1 AND "experiment_id" = $2"#,
        )
        .bind(column_id)
        .bind(experiment_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn insert_rows(&mut self, rows: &[ExperimentData]) -> DatasheetResult<()> {
        let sql = format!(
            r#"INSERT INTO "experiment_data" ({}) VALUES ($1, $2, $3, $4, $5)"#,
            DATA_COLUMNS
        );
        log_sql(&sql);
        for row in rows {
            sqlx::query(&sql)
                .bind(row.id)
                .bind(row.experiment_id)
                .bind(Value::Object(row.data.clone()))
                .bind(row.created_at)
                .bind(row.updated_at)
                .execute(&mut *self.tx)
                .await?;
        }
        Ok(())
    }

    async fn save_row(&mut self, row: &ExperimentData) -> DatasheetResult<()> {
        sqlx::query(r#"UPDATE "experiment_data" SET "data" = $2, "updated_at" = $3 WHERE "id" = $1"#)
            .bind(row.id)
            .bind(Value::Object(row.data.clone()))
            .bind(row.updated_at)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn delete_rows(&mut self, experiment_id: Uuid, data_ids: &[Uuid]) -> DatasheetResult<u64> {
        if data_ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            r#"DELETE FROM "experiment_data" WHERE "experiment_id" = $1 AND "id" = ANY($2)"#,
        )
        .bind(experiment_id)
        .bind(data_ids.to_vec())
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> DatasheetResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

fn bind_param<'q>(
    q: sqlx::query::Query<'q, Postgres, PgArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s),
        Value::Array(_) | Value::Object(_) => q.bind(v.clone()),
    }
}

fn bind_param_query_as<'q, O>(
    q: sqlx::query::QueryAs<'q, Postgres, O, PgArguments>,
    v: &'q Value,
) -> sqlx::query::QueryAs<'q, Postgres, O, PgArguments>
where
    O: for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow>,
{
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s),
        Value::Array(_) | Value::Object(_) => q.bind(v.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_like_wildcards() {
        assert_eq!(like_pattern("trial"), "%trial%");
        assert_eq!(like_pattern("50%_a\\b"), "%50\\%\\_a\\\\b%");
    }
}
