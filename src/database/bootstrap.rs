use sqlx::PgPool;
use tracing::info;

use super::manager::DatabaseError;

/// Datasheet tables. `seq` keeps insertion order for stable sorting; foreign
/// keys are plain columns and deletes cascade in the service transaction.
const STATEMENTS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS "experiments" (
        "id" UUID PRIMARY KEY,
        "name" TEXT NOT NULL,
        "description" TEXT,
        "creator" TEXT NOT NULL,
        "created_at" TIMESTAMPTZ NOT NULL,
        "updated_at" TIMESTAMPTZ NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "column_definitions" (
        "id" UUID PRIMARY KEY,
        "seq" BIGSERIAL NOT NULL,
        "experiment_id" UUID NOT NULL,
        "field_name" TEXT NOT NULL,
        "display_name" TEXT NOT NULL,
        "data_type" TEXT NOT NULL,
        "is_required" BOOLEAN NOT NULL DEFAULT FALSE,
        "constraints" JSONB,
        "created_at" TIMESTAMPTZ NOT NULL,
        "updated_at" TIMESTAMPTZ NOT NULL
    )"#,
    r#"CREATE INDEX IF NOT EXISTS "column_definitions_experiment_idx"
        ON "column_definitions" ("experiment_id", "created_at", "seq")"#,
    r#"CREATE TABLE IF NOT EXISTS "experiment_data" (
        "id" UUID PRIMARY KEY,
        "seq" BIGSERIAL NOT NULL,
        "experiment_id" UUID NOT NULL,
        "data" JSONB NOT NULL,
        "created_at" TIMESTAMPTZ NOT NULL,
        "updated_at" TIMESTAMPTZ NOT NULL
    )"#,
    r#"CREATE INDEX IF NOT EXISTS "experiment_data_experiment_idx"
        ON "experiment_data" ("experiment_id", "created_at", "seq")"#,
];

/// Create missing tables; safe to run on every start
pub async fn run(pool: &PgPool) -> Result<(), DatabaseError> {
    for statement in STATEMENTS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;
    }
    info!("Datasheet tables ready");
    Ok(())
}
