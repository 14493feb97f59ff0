use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::database::models::{
    ColumnDefinition, ColumnUpdate, DataPage, Experiment, ExperimentData, ExperimentDetails,
    ExperimentFilter, NewColumn, NewExperiment, ANONYMOUS_CREATOR,
};
use crate::datasheet::export::{render_csv, ExportFile, ExportFormat};
use crate::datasheet::importer::{parse_spreadsheet, plan_import, plan_sheet_import, ImportPlan};
use crate::datasheet::schema::{validate_field_name, validate_new_columns};
use crate::datasheet::validator::validate;
use crate::datasheet::{DatasheetError, DatasheetResult, DatasheetStore, StoreRead, StoreTx};
use crate::filter::{Filter, FilterData};

/// Transport-agnostic datasheet operations over an injected store
#[derive(Clone)]
pub struct DatasheetService {
    store: Arc<dyn DatasheetStore>,
}

impl DatasheetService {
    pub fn new(store: Arc<dyn DatasheetStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DatasheetStore> {
        &self.store
    }

    // Experiments

    pub async fn create_experiment(&self, input: NewExperiment) -> DatasheetResult<Experiment> {
        if input.name.trim().is_empty() {
            warn!("Rejected experiment without a name");
            return Err(DatasheetError::ExperimentNameRequired);
        }

        let now = Utc::now();
        let experiment = Experiment {
            id: Uuid::new_v4(),
            name: input.name,
            description: input.description,
            creator: input
                .creator
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| ANONYMOUS_CREATOR.to_string()),
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.store.begin().await?;
        tx.insert_experiment(&experiment).await?;
        tx.commit().await?;

        info!("Created experiment {} ({})", experiment.id, experiment.name);
        Ok(experiment)
    }

    pub async fn list_experiments(&self, filter: ExperimentFilter) -> DatasheetResult<Vec<Experiment>> {
        let mut reader = self.store.snapshot().await?;
        let experiments = reader.list_experiments(&filter).await?;
        debug!("Listed {} experiments", experiments.len());
        Ok(experiments)
    }

    pub async fn get_experiment(&self, experiment_id: Uuid) -> DatasheetResult<ExperimentDetails> {
        let mut reader = self.store.snapshot().await?;
        let experiment = require_experiment(reader.as_mut(), experiment_id).await?;
        let columns = reader.list_columns(experiment_id).await?;
        Ok(ExperimentDetails { experiment, columns })
    }

    pub async fn delete_experiment(&self, experiment_id: Uuid) -> DatasheetResult<()> {
        let mut tx = self.store.begin().await?;
        if tx.delete_experiment(experiment_id).await? == 0 {
            return Err(DatasheetError::ExperimentNotFound(experiment_id));
        }
        tx.commit().await?;

        info!("Deleted experiment {} with its columns and data", experiment_id);
        Ok(())
    }

    // Columns

    pub async fn add_columns(
        &self,
        experiment_id: Uuid,
        columns: Vec<NewColumn>,
    ) -> DatasheetResult<Vec<ColumnDefinition>> {
        let mut tx = self.store.begin().await?;
        require_experiment(tx.as_mut(), experiment_id).await?;

        let existing = tx.list_columns(experiment_id).await?;
        if let Err(e) = validate_new_columns(&existing, &columns) {
            warn!("Rejected columns for experiment {}: {}", experiment_id, e);
            return Err(e);
        }

        let now = Utc::now();
        let created: Vec<ColumnDefinition> = columns
            .into_iter()
            .map(|column| column.into_definition(experiment_id, now))
            .collect();
        tx.insert_columns(&created).await?;
        tx.commit().await?;

        info!("Added {} columns to experiment {}", created.len(), experiment_id);
        Ok(created)
    }

    pub async fn update_column(
        &self,
        experiment_id: Uuid,
        column_id: Uuid,
        updates: ColumnUpdate,
    ) -> DatasheetResult<ColumnDefinition> {
        let mut tx = self.store.begin().await?;
        let mut column = tx
            .find_column(experiment_id, column_id)
            .await?
            .ok_or(DatasheetError::ColumnNotFound(column_id))?;

        if let Some(field_name) = updates.field_name.as_deref().filter(|f| *f != column.field_name) {
            validate_field_name(field_name)?;
            let taken = tx
                .list_columns(experiment_id)
                .await?
                .iter()
                .any(|c| c.id != column_id && c.field_name == field_name);
            if taken {
                return Err(DatasheetError::DuplicateFieldName(field_name.to_string()));
            }
        }

        updates.apply(&mut column, Utc::now());
        tx.save_column(&column).await?;
        tx.commit().await?;

        info!("Updated column {} of experiment {}", column_id, experiment_id);
        Ok(column)
    }

    pub async fn delete_column(&self, experiment_id: Uuid, column_id: Uuid) -> DatasheetResult<()> {
        let mut tx = self.store.begin().await?;
        if tx.delete_column(experiment_id, column_id).await? == 0 {
            return Err(DatasheetError::ColumnNotFound(column_id));
        }
        tx.commit().await?;

        info!("Deleted column {} of experiment {}", column_id, experiment_id);
        Ok(())
    }

    // Rows

    pub async fn add_data(&self, experiment_id: Uuid, raw: Value) -> DatasheetResult<ExperimentData> {
        let Value::Object(raw) = raw else {
            return Err(DatasheetError::InvalidRecord);
        };

        let mut tx = self.store.begin().await?;
        require_experiment(tx.as_mut(), experiment_id).await?;

        let columns = tx.list_columns(experiment_id).await?;
        if columns.is_empty() {
            return Err(DatasheetError::NoColumnsDefined);
        }

        let data = validate(&raw, &columns)?;
        let row = ExperimentData::new(experiment_id, data, Utc::now());
        tx.insert_rows(std::slice::from_ref(&row)).await?;
        tx.commit().await?;

        debug!("Added row {} to experiment {}", row.id, experiment_id);
        Ok(row)
    }

    /// Merge `patch` over the stored row and re-validate against current columns
    pub async fn update_data(
        &self,
        experiment_id: Uuid,
        data_id: Uuid,
        patch: Value,
    ) -> DatasheetResult<ExperimentData> {
        let Value::Object(patch) = patch else {
            return Err(DatasheetError::InvalidRecord);
        };

        let mut tx = self.store.begin().await?;
        let mut row = tx
            .find_row(experiment_id, data_id)
            .await?
            .ok_or(DatasheetError::DataNotFound(data_id))?;

        let columns = tx.list_columns(experiment_id).await?;
        let mut merged = row.data.clone();
        merged.extend(patch);

        row.data = validate(&merged, &columns)?;
        row.updated_at = Utc::now();
        tx.save_row(&row).await?;
        tx.commit().await?;

        debug!("Updated row {} of experiment {}", data_id, experiment_id);
        Ok(row)
    }

    pub async fn delete_data(&self, experiment_id: Uuid, data_id: Uuid) -> DatasheetResult<()> {
        let mut tx = self.store.begin().await?;
        if tx.delete_rows(experiment_id, &[data_id]).await? == 0 {
            return Err(DatasheetError::DataNotFound(data_id));
        }
        tx.commit().await?;

        debug!("Deleted row {} of experiment {}", data_id, experiment_id);
        Ok(())
    }

    pub async fn batch_delete_data(&self, experiment_id: Uuid, data_ids: &[Uuid]) -> DatasheetResult<u64> {
        let mut tx = self.store.begin().await?;
        let deleted = tx.delete_rows(experiment_id, data_ids).await?;
        tx.commit().await?;

        info!("Batch deleted {} of {} rows from experiment {}", deleted, data_ids.len(), experiment_id);
        Ok(deleted)
    }

    /// Import rows, inferring string columns from the first row when the
    /// experiment has none. Either everything is written or nothing is.
    pub async fn batch_import_data(
        &self,
        experiment_id: Uuid,
        rows: Vec<Value>,
    ) -> DatasheetResult<Vec<ExperimentData>> {
        self.run_import(experiment_id, |existing, now| {
            plan_import(experiment_id, existing, rows, now)
        })
        .await
    }

    /// Import a CSV or XLSX upload; a first import takes its columns from the
    /// header row
    pub async fn import_from_spreadsheet(
        &self,
        experiment_id: Uuid,
        bytes: &[u8],
    ) -> DatasheetResult<Vec<ExperimentData>> {
        let sheet = parse_spreadsheet(bytes)?;
        self.run_import(experiment_id, |existing, now| {
            plan_sheet_import(experiment_id, existing, sheet, now)
        })
        .await
    }

    async fn run_import<F>(&self, experiment_id: Uuid, plan: F) -> DatasheetResult<Vec<ExperimentData>>
    where
        F: FnOnce(&[ColumnDefinition], DateTime<Utc>) -> DatasheetResult<ImportPlan> + Send,
    {
        let mut tx = self.store.begin().await?;
        require_experiment(tx.as_mut(), experiment_id).await?;

        let existing = tx.list_columns(experiment_id).await?;
        let now = Utc::now();
        let plan = match plan(&existing, now) {
            Ok(plan) => plan,
            Err(e) => {
                warn!("Rejected import into experiment {}: {}", experiment_id, e);
                return Err(e);
            }
        };

        if !plan.new_columns.is_empty() {
            tx.insert_columns(&plan.new_columns).await?;
            info!("Inferred {} columns for experiment {}", plan.new_columns.len(), experiment_id);
        }

        let records: Vec<ExperimentData> = plan
            .rows
            .into_iter()
            .map(|data| ExperimentData::new(experiment_id, data, now))
            .collect();
        tx.insert_rows(&records).await?;
        tx.commit().await?;

        info!("Imported {} rows into experiment {}", records.len(), experiment_id);
        Ok(records)
    }

    // Query and export

    pub async fn query_data(&self, experiment_id: Uuid, query: FilterData) -> DatasheetResult<DataPage> {
        let filter = Filter::from_data(query)?;

        let mut reader = self.store.snapshot().await?;
        let (total, rows) = reader.query_rows(experiment_id, &filter).await.map_err(|e| match e {
            DatasheetError::Persistence(msg) => DatasheetError::QueryFailed(msg),
            other => other,
        })?;

        debug!(
            "Query on experiment {} matched {} rows (page {}, limit {})",
            experiment_id,
            total,
            filter.page(),
            filter.limit()
        );
        Ok(DataPage::new(total, filter.page(), filter.limit(), rows))
    }

    pub async fn export_csv(&self, experiment_id: Uuid) -> DatasheetResult<String> {
        let (_, csv) = self.render_export(experiment_id).await?;
        Ok(csv)
    }

    pub async fn export_data(&self, experiment_id: Uuid, format: &str) -> DatasheetResult<ExportFile> {
        let format: ExportFormat = format.parse()?;
        let (experiment, body) = self.render_export(experiment_id).await?;

        info!("Exported experiment {} as {}", experiment_id, format.extension());
        Ok(ExportFile {
            file_name: format!("{}.{}", experiment.name, format.extension()),
            content_type: format.content_type(),
            body,
        })
    }

    async fn render_export(&self, experiment_id: Uuid) -> DatasheetResult<(Experiment, String)> {
        let mut reader = self.store.snapshot().await?;
        let experiment = require_experiment(reader.as_mut(), experiment_id).await?;
        let columns = reader.list_columns(experiment_id).await?;
        let records = reader.list_rows_for_export(experiment_id).await?;
        Ok((experiment, render_csv(&columns, &records)))
    }
}

async fn require_experiment<S>(store: &mut S, experiment_id: Uuid) -> DatasheetResult<Experiment>
where
    S: StoreRead + ?Sized,
{
    store
        .find_experiment(experiment_id)
        .await?
        .ok_or(DatasheetError::ExperimentNotFound(experiment_id))
}
