mod common;

use std::time::Duration;

use anyhow::Result;
use serde_json::{json, Value};

use lab_datasheet_api::database::models::{DataType, NewColumn};
use lab_datasheet_api::datasheet::DatasheetStore;
use lab_datasheet_api::filter::FilterData;
use lab_datasheet_api::services::DatasheetService;
use uuid::Uuid;

/// Twelve rows: tag S01..S12, group A/B alternating, weight 30 + i, some
/// rows without a weight
async fn herd(service: &DatasheetService) -> Result<Uuid> {
    let id = common::experiment(service, "herd").await?;
    service
        .add_columns(
            id,
            vec![
                NewColumn::new("tag", DataType::String),
                NewColumn::new("group", DataType::String),
                NewColumn::new("weight", DataType::Number),
            ],
        )
        .await?;

    let rows: Vec<Value> = (1..=12)
        .map(|i| {
            let group = if i % 2 == 0 { "B" } else { "A" };
            if i % 5 == 0 {
                json!({ "tag": format!("S{:02}", i), "group": group })
            } else {
                json!({ "tag": format!("S{:02}", i), "group": group, "weight": 30 + i })
            }
        })
        .collect();
    service.batch_import_data(id, rows).await?;
    Ok(id)
}

fn tags(page: &lab_datasheet_api::database::models::DataPage) -> Vec<String> {
    page.data
        .iter()
        .map(|r| r.data["tag"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn default_query_pages_newest_first() -> Result<()> {
    let service = common::service();
    let id = herd(&service).await?;

    let page = service.query_data(id, FilterData::default()).await?;
    assert_eq!(page.total, 12);
    assert_eq!(page.page, 1);
    assert_eq!(page.limit, 10);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.data.len(), 10);
    // one import shares a timestamp; insertion order breaks the tie
    assert_eq!(tags(&page)[0], "S12");
    assert_eq!(tags(&page)[9], "S03");

    let second = service.query_data(id, FilterData::default().paginate(2, 10)).await?;
    assert_eq!(tags(&second), vec!["S02", "S01"]);
    Ok(())
}

#[tokio::test]
async fn pages_partition_the_result_set() -> Result<()> {
    let service = common::service();
    let id = herd(&service).await?;

    let mut seen = Vec::new();
    for page_no in 1..=3 {
        let page = service
            .query_data(id, FilterData::default().sort("tag", "asc").paginate(page_no, 5))
            .await?;
        assert_eq!(page.total_pages, 3);
        seen.extend(tags(&page));
    }
    let expected: Vec<String> = (1..=12).map(|i| format!("S{:02}", i)).collect();
    assert_eq!(seen, expected);

    let beyond = service.query_data(id, FilterData::default().paginate(9, 5)).await?;
    assert!(beyond.data.is_empty());
    assert_eq!(beyond.total, 12);
    Ok(())
}

#[tokio::test]
async fn filters_compare_text_forms() -> Result<()> {
    let service = common::service();
    let id = herd(&service).await?;

    let group_b = service
        .query_data(id, FilterData::default().filter("group", "B"))
        .await?;
    assert_eq!(group_b.total, 6);
    assert!(group_b.data.iter().all(|r| r.data["group"] == json!("B")));

    // numeric value matched through its text form, either way round
    let by_string = service
        .query_data(id, FilterData::default().filter("weight", "33"))
        .await?;
    let by_number = service
        .query_data(id, FilterData::default().filter("weight", 33))
        .await?;
    assert_eq!(tags(&by_string), vec!["S03"]);
    assert_eq!(tags(&by_number), vec!["S03"]);

    let both = service
        .query_data(id, FilterData::default().filter("group", "A").filter("weight", "34"))
        .await?;
    assert_eq!(both.total, 0);

    let unknown_key = service
        .query_data(id, FilterData::default().filter("color", "red"))
        .await?;
    assert_eq!(unknown_key.total, 0);
    assert_eq!(unknown_key.total_pages, 0);
    Ok(())
}

#[tokio::test]
async fn sorting_on_json_keys_puts_missing_first_ascending() -> Result<()> {
    let service = common::service();
    let id = herd(&service).await?;

    let asc = service
        .query_data(id, FilterData::default().sort("weight", "ASC").paginate(1, 12))
        .await?;
    let asc_tags = tags(&asc);
    assert_eq!(&asc_tags[..2], &["S05", "S10"]);
    assert_eq!(&asc_tags[2..4], &["S01", "S02"]);

    let desc = service
        .query_data(id, FilterData::default().sort("weight", "desc").paginate(1, 12))
        .await?;
    let desc_tags = tags(&desc);
    assert_eq!(desc_tags[0], "S12");
    assert_eq!(&desc_tags[10..], &["S10", "S05"]);
    Ok(())
}

#[tokio::test]
async fn record_attributes_sort_too() -> Result<()> {
    let service = common::service();
    let id = herd(&service).await?;

    let by_created = service
        .query_data(id, FilterData::default().sort("createdAt", "asc").paginate(1, 3))
        .await?;
    assert_eq!(tags(&by_created), vec!["S01", "S02", "S03"]);

    let by_id = service
        .query_data(id, FilterData::default().sort("id", "asc").paginate(1, 12))
        .await?;
    let ids: Vec<_> = by_id.data.iter().map(|r| r.id).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);
    Ok(())
}

#[tokio::test]
async fn rejects_invalid_query_parameters() -> Result<()> {
    let service = common::service();
    let id = herd(&service).await?;

    let cases = [
        (FilterData::default().filter("bad key", "x"), "INVALID_FILTER_KEY"),
        (FilterData::default().filter("weight'--", "x"), "INVALID_FILTER_KEY"),
        (FilterData::default().sort("data.weight", "asc"), "INVALID_SORT_FIELD"),
        (FilterData::default().sort("weight", "up"), "INVALID_SORT_ORDER"),
        (FilterData::default().paginate(0, 10), "INVALID_PAGINATION"),
        (FilterData::default().paginate(1, 0), "INVALID_PAGINATION"),
    ];
    for (query, code) in cases {
        let err = service.query_data(id, query).await.unwrap_err();
        assert_eq!(err.code(), code);
        assert_eq!(err.kind().as_str(), "INVALID_QUERY_PARAM");
    }
    Ok(())
}

#[tokio::test]
async fn limit_is_capped_by_config() -> Result<()> {
    let service = common::service();
    let id = herd(&service).await?;

    let page = service
        .query_data(id, FilterData::default().paginate(1, u32::MAX))
        .await?;
    assert_eq!(page.data.len(), 12);
    assert!(page.limit < u32::MAX);
    assert_eq!(page.total_pages, 1);
    Ok(())
}

#[tokio::test]
async fn queries_are_scoped_to_experiment() -> Result<()> {
    let service = common::service();
    let herd_id = herd(&service).await?;
    let other = common::experiment(&service, "other").await?;

    assert_eq!(service.query_data(other, FilterData::default()).await?.total, 0);
    assert_eq!(service.query_data(herd_id, FilterData::default()).await?.total, 12);
    Ok(())
}

#[tokio::test]
async fn reads_proceed_while_a_write_is_open() -> Result<()> {
    let service = common::service();
    let id = herd(&service).await?;

    let _open = service.store().begin().await?;
    let page = tokio::time::timeout(Duration::from_secs(1), service.query_data(id, FilterData::default())).await??;
    assert_eq!(page.total, 12);

    let file = tokio::time::timeout(Duration::from_secs(1), service.export_data(id, "csv")).await??;
    assert!(file.body.starts_with('\u{FEFF}'));
    Ok(())
}
