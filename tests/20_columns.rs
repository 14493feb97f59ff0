mod common;

use anyhow::Result;
use serde_json::json;
use uuid::Uuid;

use lab_datasheet_api::database::models::{ColumnUpdate, DataType, NewColumn};
use lab_datasheet_api::filter::FilterData;

#[tokio::test]
async fn add_columns_rejects_bad_names_atomically() -> Result<()> {
    let service = common::service();
    let id = common::experiment(&service, "names").await?;

    let cases = [
        ("weight kg", "INVALID_FIELD_NAME"),
        ("", "INVALID_FIELD_NAME"),
        ("CreatedAt", "RESERVED_FIELD_NAME"),
        ("data", "RESERVED_FIELD_NAME"),
    ];
    for (name, code) in cases {
        let err = service
            .add_columns(id, vec![NewColumn::new("ok", DataType::String), NewColumn::new(name, DataType::String)])
            .await
            .unwrap_err();
        assert_eq!(err.code(), code, "field name {:?}", name);
    }

    // nothing from the rejected batches was stored
    assert!(service.get_experiment(id).await?.columns.is_empty());
    Ok(())
}

#[tokio::test]
async fn add_columns_rejects_duplicates() -> Result<()> {
    let service = common::service();
    let id = common::sheep_trial(&service).await?;

    let err = service
        .add_columns(id, vec![NewColumn::new("weight", DataType::Number)])
        .await
        .unwrap_err();
    assert_eq!(err.code(), "DUPLICATE_FIELD_NAME");

    let err = service
        .add_columns(id, vec![NewColumn::new("x", DataType::Number), NewColumn::new("x", DataType::String)])
        .await
        .unwrap_err();
    assert_eq!(err.code(), "DUPLICATE_FIELD_NAME");
    Ok(())
}

#[tokio::test]
async fn add_columns_requires_experiment() -> Result<()> {
    let service = common::service();
    let err = service
        .add_columns(Uuid::new_v4(), vec![NewColumn::new("a", DataType::String)])
        .await
        .unwrap_err();
    assert_eq!(err.code(), "EXPERIMENT_NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn display_name_defaults_to_field_name() -> Result<()> {
    let service = common::service();
    let id = common::experiment(&service, "labels").await?;
    let created = service
        .add_columns(id, vec![NewColumn::new("ear_tag", DataType::String)])
        .await?;
    assert_eq!(created[0].display_name, "ear_tag");
    assert!(!created[0].is_required);
    Ok(())
}

#[tokio::test]
async fn update_column_changes_validation() -> Result<()> {
    let service = common::service();
    let id = common::sheep_trial(&service).await?;
    let weight = service.get_experiment(id).await?.columns[1].clone();

    let updated = service
        .update_column(
            id,
            weight.id,
            ColumnUpdate { is_required: Some(true), display_name: Some("Mass".into()), ..Default::default() },
        )
        .await?;
    assert!(updated.is_required);
    assert_eq!(updated.display_name, "Mass");
    assert_eq!(updated.field_name, "weight");
    assert!(updated.updated_at >= weight.updated_at);

    let err = service.add_data(id, json!({ "sheep": "A1" })).await.unwrap_err();
    assert_eq!(err.code(), "REQUIRED_FIELD_MISSING");
    assert_eq!(err.to_string(), "Field 'Mass' (weight) is required");
    Ok(())
}

#[tokio::test]
async fn update_column_revalidates_field_name() -> Result<()> {
    let service = common::service();
    let id = common::sheep_trial(&service).await?;
    let weight = service.get_experiment(id).await?.columns[1].clone();

    let rename = |name: &str| ColumnUpdate { field_name: Some(name.to_string()), ..Default::default() };

    let err = service.update_column(id, weight.id, rename("id")).await.unwrap_err();
    assert_eq!(err.code(), "RESERVED_FIELD_NAME");
    let err = service.update_column(id, weight.id, rename("sheep")).await.unwrap_err();
    assert_eq!(err.code(), "DUPLICATE_FIELD_NAME");
    let err = service.update_column(id, weight.id, rename("bad-name")).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_FIELD_NAME");

    let renamed = service.update_column(id, weight.id, rename("mass_kg")).await?;
    assert_eq!(renamed.field_name, "mass_kg");
    // same name is a no-op rename
    service.update_column(id, weight.id, rename("mass_kg")).await?;
    Ok(())
}

#[tokio::test]
async fn column_lookups_are_scoped_to_experiment() -> Result<()> {
    let service = common::service();
    let a = common::sheep_trial(&service).await?;
    let b = common::experiment(&service, "other").await?;
    let column = service.get_experiment(a).await?.columns[0].clone();

    let err = service
        .update_column(b, column.id, ColumnUpdate::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "COLUMN_NOT_FOUND");
    assert_eq!(service.delete_column(b, column.id).await.unwrap_err().code(), "COLUMN_NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn deleting_a_column_keeps_stored_values() -> Result<()> {
    let service = common::service();
    let id = common::sheep_trial(&service).await?;
    let row = service
        .add_data(id, json!({ "sheep": "A1", "weight": "42.5" }))
        .await?;
    let weight = service.get_experiment(id).await?.columns[1].clone();

    service.delete_column(id, weight.id).await?;
    assert_eq!(service.delete_column(id, weight.id).await.unwrap_err().code(), "COLUMN_NOT_FOUND");

    let page = service.query_data(id, FilterData::default()).await?;
    assert_eq!(page.data[0].id, row.id);
    assert_eq!(page.data[0].data["weight"], json!(42.5));

    // the orphaned field stays filterable
    let filtered = service
        .query_data(id, FilterData::default().filter("weight", "42.5"))
        .await?;
    assert_eq!(filtered.total, 1);
    assert_eq!(filtered.data[0].id, row.id);

    // new writes no longer carry the deleted field
    let fresh = service.add_data(id, json!({ "sheep": "A2", "weight": 50 })).await?;
    assert!(!fresh.data.contains_key("weight"));
    Ok(())
}
