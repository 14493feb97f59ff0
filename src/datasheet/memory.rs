use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use super::error::DatasheetResult;
use super::store::{DatasheetStore, StoreRead, StoreTx};
use crate::database::models::{ColumnDefinition, Experiment, ExperimentData, ExperimentFilter};
use crate::filter::Filter;

/// Insertion-ordered tables
#[derive(Debug, Clone, Default)]
struct State {
    experiments: Vec<Experiment>,
    columns: Vec<ColumnDefinition>,
    rows: Vec<ExperimentData>,
}

/// In-process store.
///
/// Committed state is an immutable `Arc<State>`. Snapshots share it without
/// holding any lock; transactions are serialized by `writer`, edit a private
/// copy and publish it on commit.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    committed: Arc<RwLock<Arc<State>>>,
    writer: Arc<Mutex<()>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn current(&self) -> Arc<State> {
        self.committed.read().await.clone()
    }
}

#[async_trait]
impl DatasheetStore for MemoryStore {
    async fn begin(&self) -> DatasheetResult<Box<dyn StoreTx>> {
        let writer = self.writer.clone().lock_owned().await;
        let working = State::clone(&*self.current().await);
        Ok(Box::new(MemoryTx {
            _writer: writer,
            committed: self.committed.clone(),
            working,
        }))
    }

    async fn snapshot(&self) -> DatasheetResult<Box<dyn StoreRead>> {
        Ok(Box::new(MemorySnapshot { state: self.current().await }))
    }

    async fn health_check(&self) -> DatasheetResult<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

impl State {
    fn find_experiment(&self, id: Uuid) -> Option<Experiment> {
        self.experiments.iter().find(|e| e.id == id).cloned()
    }

    fn list_experiments(&self, filter: &ExperimentFilter) -> Vec<Experiment> {
        let mut experiments: Vec<Experiment> = self
            .experiments
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        experiments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        experiments
    }

    fn list_columns(&self, experiment_id: Uuid) -> Vec<ColumnDefinition> {
        let mut columns: Vec<ColumnDefinition> = self
            .columns
            .iter()
            .filter(|c| c.experiment_id == experiment_id)
            .cloned()
            .collect();
        // stable: equal timestamps keep insertion order
        columns.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        columns
    }

    fn find_column(&self, experiment_id: Uuid, column_id: Uuid) -> Option<ColumnDefinition> {
        self.columns
            .iter()
            .find(|c| c.id == column_id && c.experiment_id == experiment_id)
            .cloned()
    }

    fn find_row(&self, experiment_id: Uuid, data_id: Uuid) -> Option<ExperimentData> {
        self.rows
            .iter()
            .find(|r| r.id == data_id && r.experiment_id == experiment_id)
            .cloned()
    }

    fn query_rows(&self, experiment_id: Uuid, filter: &Filter) -> (u64, Vec<ExperimentData>) {
        filter.apply(self.rows.iter().filter(|r| r.experiment_id == experiment_id))
    }

    fn list_rows_for_export(&self, experiment_id: Uuid) -> Vec<ExperimentData> {
        let mut rows: Vec<ExperimentData> = self
            .rows
            .iter()
            .rev()
            .filter(|r| r.experiment_id == experiment_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows
    }
}

/// Implements [`StoreRead`] by delegating to the `State` behind `$field`
macro_rules! read_from_state {
    ($ty:ty, $field:ident) => {
        #[async_trait]
        impl StoreRead for $ty {
            async fn find_experiment(&mut self, id: Uuid) -> DatasheetResult<Option<Experiment>> {
                Ok(self.$field.find_experiment(id))
            }

            async fn list_experiments(&mut self, filter: &ExperimentFilter) -> DatasheetResult<Vec<Experiment>> {
                Ok(self.$field.list_experiments(filter))
            }

            async fn list_columns(&mut self, experiment_id: Uuid) -> DatasheetResult<Vec<ColumnDefinition>> {
                Ok(self.$field.list_columns(experiment_id))
            }

            async fn find_column(
                &mut self,
                experiment_id: Uuid,
                column_id: Uuid,
            ) -> DatasheetResult<Option<ColumnDefinition>> {
                Ok(self.$field.find_column(experiment_id, column_id))
            }

            async fn find_row(&mut self, experiment_id: Uuid, data_id: Uuid) -> DatasheetResult<Option<ExperimentData>> {
                Ok(self.$field.find_row(experiment_id, data_id))
            }

            async fn query_rows(
                &mut self,
                experiment_id: Uuid,
                filter: &Filter,
            ) -> DatasheetResult<(u64, Vec<ExperimentData>)> {
                Ok(self.$field.query_rows(experiment_id, filter))
            }

            async fn list_rows_for_export(&mut self, experiment_id: Uuid) -> DatasheetResult<Vec<ExperimentData>> {
                Ok(self.$field.list_rows_for_export(experiment_id))
            }
        }
    };
}

/// Committed state as of [`MemoryStore::snapshot`]
struct MemorySnapshot {
    state: Arc<State>,
}

read_from_state!(MemorySnapshot, state);

struct MemoryTx {
    _writer: OwnedMutexGuard<()>,
    committed: Arc<RwLock<Arc<State>>>,
    working: State,
}

read_from_state!(MemoryTx, working);

#[async_trait]
impl StoreTx for MemoryTx {
    async fn insert_experiment(&mut self, experiment: &Experiment) -> DatasheetResult<()> {
        self.working.experiments.push(experiment.clone());
        Ok(())
    }

    async fn delete_experiment(&mut self, id: Uuid) -> DatasheetResult<u64> {
        let before = self.working.experiments.len();
        self.working.experiments.retain(|e| e.id != id);
        let deleted = (before - self.working.experiments.len()) as u64;
        if deleted > 0 {
            self.working.columns.retain(|c| c.experiment_id != id);
            self.working.rows.retain(|r| r.experiment_id != id);
        }
        Ok(deleted)
    }

    async fn insert_columns(&mut self, columns: &[ColumnDefinition]) -> DatasheetResult<()> {
        self.working.columns.extend_from_slice(columns);
        Ok(())
    }

    async fn save_column(&mut self, column: &ColumnDefinition) -> DatasheetResult<()> {
        if let Some(slot) = self.working.columns.iter_mut().find(|c| c.id == column.id) {
            *slot = column.clone();
        }
        Ok(())
    }

    async fn delete_column(&mut self, experiment_id: Uuid, column_id: Uuid) -> DatasheetResult<u64> {
        let before = self.working.columns.len();
        self.working
            .columns
            .retain(|c| !(c.id == column_id && c.experiment_id == experiment_id));
        Ok((before - self.working.columns.len()) as u64)
    }

    async fn insert_rows(&mut self, rows: &[ExperimentData]) -> DatasheetResult<()> {
        self.working.rows.extend_from_slice(rows);
        Ok(())
    }

    async fn save_row(&mut self, row: &ExperimentData) -> DatasheetResult<()> {
        if let Some(slot) = self.working.rows.iter_mut().find(|r| r.id == row.id) {
            *slot = row.clone();
        }
        Ok(())
    }

    async fn delete_rows(&mut self, experiment_id: Uuid, data_ids: &[Uuid]) -> DatasheetResult<u64> {
        let before = self.working.rows.len();
        self.working
            .rows
            .retain(|r| !(r.experiment_id == experiment_id && data_ids.contains(&r.id)));
        Ok((before - self.working.rows.len()) as u64)
    }

    async fn commit(self: Box<Self>) -> DatasheetResult<()> {
        let MemoryTx { _writer, committed, working } = *self;
        *committed.write().await = Arc::new(working);
        Ok(())
    }
}
