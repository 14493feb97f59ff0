#![allow(dead_code)]

use std::sync::{Arc, Once};

use anyhow::Result;
use serde_json::Value;
use uuid::Uuid;

use lab_datasheet_api::database::models::{DataType, NewColumn, NewExperiment};
use lab_datasheet_api::datasheet::MemoryStore;
use lab_datasheet_api::services::DatasheetService;

static TRACING: Once = Once::new();

/// Quiet by default; set RUST_LOG to see service logs while debugging tests
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Fresh service over an empty in-memory store
pub fn service() -> DatasheetService {
    init_tracing();
    DatasheetService::new(Arc::new(MemoryStore::new()))
}

pub async fn experiment(service: &DatasheetService, name: &str) -> Result<Uuid> {
    let experiment = service
        .create_experiment(NewExperiment::new(name).creator("tester"))
        .await?;
    Ok(experiment.id)
}

/// Experiment with `sheep` (required string), `weight` (number), `healthy`
/// (boolean) and `measured` (date)
pub async fn sheep_trial(service: &DatasheetService) -> Result<Uuid> {
    let id = experiment(service, "Trial A").await?;
    service
        .add_columns(
            id,
            vec![
                NewColumn::new("sheep", DataType::String).display_name("Sheep").required(),
                NewColumn::new("weight", DataType::Number).display_name("Weight (kg)"),
                NewColumn::new("healthy", DataType::Boolean).display_name("Healthy"),
                NewColumn::new("measured", DataType::Date).display_name("Measured"),
            ],
        )
        .await?;
    Ok(id)
}

/// Unwrap a `json!` object literal into the map form rows use
pub fn object(value: Value) -> serde_json::Map<String, Value> {
    value.as_object().cloned().expect("object literal")
}
