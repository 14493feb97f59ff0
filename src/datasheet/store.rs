//! Storage seam for the datasheet engine.
//!
//! Mutations go through a [`StoreTx`]; a transaction dropped without
//! [`StoreTx::commit`] leaves the store untouched. Read-only operations use a
//! [`StoreRead`] from [`DatasheetStore::snapshot`], which never waits on an
//! open transaction.

use async_trait::async_trait;
use uuid::Uuid;

use super::error::DatasheetResult;
use crate::database::models::{ColumnDefinition, Experiment, ExperimentData, ExperimentFilter};
use crate::filter::Filter;

#[async_trait]
pub trait DatasheetStore: Send + Sync {
    /// Open a unit of work
    async fn begin(&self) -> DatasheetResult<Box<dyn StoreTx>>;

    /// Consistent read-only view of committed state
    async fn snapshot(&self) -> DatasheetResult<Box<dyn StoreRead>>;

    /// Liveness check for `/health`
    async fn health_check(&self) -> DatasheetResult<()>;

    /// Backend name for logs and health output
    fn backend(&self) -> &'static str;
}

#[async_trait]
pub trait StoreRead: Send {
    async fn find_experiment(&mut self, id: Uuid) -> DatasheetResult<Option<Experiment>>;

    /// Matching experiments, newest first
    async fn list_experiments(&mut self, filter: &ExperimentFilter) -> DatasheetResult<Vec<Experiment>>;

    /// Columns of one experiment in storage order
    async fn list_columns(&mut self, experiment_id: Uuid) -> DatasheetResult<Vec<ColumnDefinition>>;

    async fn find_column(
        &mut self,
        experiment_id: Uuid,
        column_id: Uuid,
    ) -> DatasheetResult<Option<ColumnDefinition>>;

    async fn find_row(&mut self, experiment_id: Uuid, data_id: Uuid) -> DatasheetResult<Option<ExperimentData>>;

    /// Total match count and the requested page
    async fn query_rows(
        &mut self,
        experiment_id: Uuid,
        filter: &Filter,
    ) -> DatasheetResult<(u64, Vec<ExperimentData>)>;

    /// All rows of one experiment, newest first
    async fn list_rows_for_export(&mut self, experiment_id: Uuid) -> DatasheetResult<Vec<ExperimentData>>;
}

#[async_trait]
pub trait StoreTx: StoreRead {
    async fn insert_experiment(&mut self, experiment: &Experiment) -> DatasheetResult<()>;

    /// Delete an experiment with its columns and rows; returns experiments deleted
    async fn delete_experiment(&mut self, id: Uuid) -> DatasheetResult<u64>;

    async fn insert_columns(&mut self, columns: &[ColumnDefinition]) -> DatasheetResult<()>;

    async fn save_column(&mut self, column: &ColumnDefinition) -> DatasheetResult<()>;

    async fn delete_column(&mut self, experiment_id: Uuid, column_id: Uuid) -> DatasheetResult<u64>;

    async fn insert_rows(&mut self, rows: &[ExperimentData]) -> DatasheetResult<()>;

    async fn save_row(&mut self, row: &ExperimentData) -> DatasheetResult<()>;

    /// Delete rows of one experiment by id; unknown ids are ignored
    async fn delete_rows(&mut self, experiment_id: Uuid, data_ids: &[Uuid]) -> DatasheetResult<u64>;

    async fn commit(self: Box<Self>) -> DatasheetResult<()>;
}
