mod common;

use anyhow::Result;
use uuid::Uuid;

use lab_datasheet_api::database::models::{DataType, ExperimentFilter, NewColumn, NewExperiment};

#[tokio::test]
async fn create_defaults_creator_to_anonymous() -> Result<()> {
    let service = common::service();

    let experiment = service.create_experiment(NewExperiment::new("Growth")).await?;
    assert_eq!(experiment.creator, "Anonymous");
    assert_eq!(experiment.created_at, experiment.updated_at);

    let named = service
        .create_experiment(NewExperiment::new("Growth 2").creator("dr. li").description("pasture"))
        .await?;
    assert_eq!(named.creator, "dr. li");
    assert_eq!(named.description.as_deref(), Some("pasture"));
    Ok(())
}

#[tokio::test]
async fn create_requires_name() -> Result<()> {
    let service = common::service();
    let err = service.create_experiment(NewExperiment::new("  ")).await.unwrap_err();
    assert_eq!(err.code(), "EXPERIMENT_NAME_REQUIRED");
    Ok(())
}

#[tokio::test]
async fn list_filters_by_creator_and_name() -> Result<()> {
    let service = common::service();
    service.create_experiment(NewExperiment::new("Sheep Weights").creator("ana")).await?;
    service.create_experiment(NewExperiment::new("Goat weights").creator("ben")).await?;
    service.create_experiment(NewExperiment::new("Soil pH").creator("ana")).await?;

    let all = service.list_experiments(ExperimentFilter::default()).await?;
    assert_eq!(all.len(), 3);
    assert!(all.windows(2).all(|w| w[0].created_at >= w[1].created_at));

    let by_name = service
        .list_experiments(ExperimentFilter { name: Some("WEIGHT".into()), ..Default::default() })
        .await?;
    assert_eq!(by_name.len(), 2);

    let by_both = service
        .list_experiments(ExperimentFilter { creator: Some("ana".into()), name: Some("weight".into()) })
        .await?;
    assert_eq!(by_both.len(), 1);
    assert_eq!(by_both[0].name, "Sheep Weights");
    Ok(())
}

#[tokio::test]
async fn get_returns_columns_in_storage_order() -> Result<()> {
    let service = common::service();
    let id = common::sheep_trial(&service).await?;
    service
        .add_columns(id, vec![NewColumn::new("notes", DataType::Text)])
        .await?;

    let details = service.get_experiment(id).await?;
    assert_eq!(details.experiment.name, "Trial A");
    let names: Vec<_> = details.columns.iter().map(|c| c.field_name.as_str()).collect();
    assert_eq!(names, vec!["sheep", "weight", "healthy", "measured", "notes"]);
    Ok(())
}

#[tokio::test]
async fn delete_cascades_and_reports_missing() -> Result<()> {
    let service = common::service();
    let id = common::sheep_trial(&service).await?;
    let row = service
        .add_data(id, serde_json::json!({ "sheep": "A1", "weight": 40 }))
        .await?;

    service.delete_experiment(id).await?;

    assert_eq!(service.get_experiment(id).await.unwrap_err().code(), "EXPERIMENT_NOT_FOUND");
    assert_eq!(service.delete_experiment(id).await.unwrap_err().code(), "EXPERIMENT_NOT_FOUND");
    assert_eq!(
        service.delete_data(id, row.id).await.unwrap_err().code(),
        "DATA_NOT_FOUND"
    );
    assert_eq!(
        service.delete_experiment(Uuid::new_v4()).await.unwrap_err().code(),
        "EXPERIMENT_NOT_FOUND"
    );
    Ok(())
}
