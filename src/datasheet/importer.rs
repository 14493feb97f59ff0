//! Bulk import planning: schema inference, key remapping and up-front
//! validation, plus spreadsheet parsing. Nothing here touches storage; the
//! service persists the plan in a single transaction.

use std::io::Cursor;

use calamine::{Data, Reader, Xlsx};
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::error::{DatasheetError, DatasheetResult};
use super::schema::{infer_columns, KeyMap};
use super::validator::{number_value, validate_rows};
use crate::database::models::{ColumnDefinition, RowData};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Local file header signature; every XLSX workbook is a zip archive
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// What a batch import will write
#[derive(Debug, Clone)]
pub struct ImportPlan {
    /// Columns inferred for an experiment that had none; empty otherwise
    pub new_columns: Vec<ColumnDefinition>,
    /// Validated rows, in input order
    pub rows: Vec<RowData>,
}

/// Rows read from an uploaded sheet, keyed by header text
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    /// Header cells in column order, blank headers removed
    pub headers: Vec<String>,
    pub rows: Vec<Value>,
}

/// Build an import plan for `experiment_id`, given its current columns.
///
/// With no existing columns the first row's keys define the schema and every
/// row is remapped through the inferred key map. All rows are validated
/// before the plan is returned.
pub fn plan_import(
    experiment_id: Uuid,
    existing: &[ColumnDefinition],
    rows: Vec<Value>,
    now: DateTime<Utc>,
) -> DatasheetResult<ImportPlan> {
    plan(experiment_id, existing, into_records(rows)?, None, now)
}

/// Like [`plan_import`], but a first import takes its columns from the sheet
/// header, so a header whose first-row cell is blank still becomes a column.
pub fn plan_sheet_import(
    experiment_id: Uuid,
    existing: &[ColumnDefinition],
    sheet: Sheet,
    now: DateTime<Utc>,
) -> DatasheetResult<ImportPlan> {
    let records = into_records(sheet.rows)?;
    plan(experiment_id, existing, records, Some(sheet.headers.as_slice()), now)
}

fn plan(
    experiment_id: Uuid,
    existing: &[ColumnDefinition],
    records: Vec<RowData>,
    headers: Option<&[String]>,
    now: DateTime<Utc>,
) -> DatasheetResult<ImportPlan> {
    if !existing.is_empty() {
        let rows = validate_rows(&records, existing)?;
        return Ok(ImportPlan { new_columns: vec![], rows });
    }

    let first = records.first().ok_or(DatasheetError::EmptyImport)?;
    let inferred = match headers {
        Some(headers) => infer_columns(headers),
        None => infer_columns(first.keys()),
    };
    let new_columns: Vec<ColumnDefinition> = inferred
        .columns
        .into_iter()
        .map(|column| column.into_definition(experiment_id, now))
        .collect();

    let remapped: Vec<RowData> = records
        .iter()
        .map(|record| remap(record, &inferred.key_map))
        .collect();
    let rows = validate_rows(&remapped, &new_columns)?;

    Ok(ImportPlan { new_columns, rows })
}

fn into_records(rows: Vec<Value>) -> DatasheetResult<Vec<RowData>> {
    rows.into_iter()
        .enumerate()
        .map(|(index, row)| match row {
            Value::Object(map) => Ok(map),
            _ => Err(DatasheetError::InvalidRecord.in_row(index)),
        })
        .collect()
}

/// Rename raw keys to canonical field names, dropping keys the map lacks
fn remap(record: &RowData, key_map: &KeyMap) -> RowData {
    record
        .iter()
        .filter_map(|(key, value)| key_map.get(key).map(|field| (field.clone(), value.clone())))
        .collect()
}

/// Parse an uploaded sheet, XLSX when it starts with a zip signature and CSV
/// otherwise
pub fn parse_spreadsheet(bytes: &[u8]) -> DatasheetResult<Sheet> {
    if bytes.starts_with(ZIP_MAGIC) {
        parse_xlsx(bytes)
    } else {
        parse_csv(bytes)
    }
}

/// Parse a CSV sheet. Every cell stays a string.
pub fn parse_csv(bytes: &[u8]) -> DatasheetResult<Sheet> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(invalid_spreadsheet)?
        .iter()
        .map(str::to_string)
        .collect();

    let mut records: Vec<Vec<Option<Value>>> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(invalid_spreadsheet)?;
        records.push(
            record
                .iter()
                .map(|cell| (!cell.is_empty()).then(|| Value::String(cell.to_string())))
                .collect(),
        );
    }

    build_sheet(headers, records)
}

/// Parse the first worksheet of an XLSX workbook. Numbers and booleans keep
/// their cell type; dates arrive as spreadsheet serial numbers.
pub fn parse_xlsx(bytes: &[u8]) -> DatasheetResult<Sheet> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes)).map_err(invalid_spreadsheet)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| DatasheetError::InvalidSpreadsheet("workbook has no worksheets".to_string()))?
        .map_err(invalid_spreadsheet)?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row.iter().map(header_text).collect(),
        None => return Err(DatasheetError::EmptyImport),
    };
    let records: Vec<Vec<Option<Value>>> = rows
        .map(|row| row.iter().map(cell_value).collect::<Vec<_>>())
        .collect();

    build_sheet(headers, records)
}

/// Key cells by header, omitting empty cells, blank headers and rows with no
/// value at all. Repeated headers get `_1`, `_2`, ... suffixes.
fn build_sheet(raw_headers: Vec<String>, records: Vec<Vec<Option<Value>>>) -> DatasheetResult<Sheet> {
    let mut keys: Vec<Option<String>> = Vec::with_capacity(raw_headers.len());
    let mut headers: Vec<String> = Vec::new();
    for raw in raw_headers {
        if raw.trim().is_empty() {
            keys.push(None);
            continue;
        }
        let mut unique = raw.clone();
        let mut counter = 1;
        while headers.contains(&unique) {
            unique = format!("{}_{}", raw, counter);
            counter += 1;
        }
        headers.push(unique.clone());
        keys.push(Some(unique));
    }

    let rows: Vec<Value> = records
        .into_iter()
        .map(|cells| {
            keys.iter()
                .zip(cells)
                .filter_map(|(key, cell)| Some((key.clone()?, cell?)))
                .collect::<RowData>()
        })
        .filter(|row| !row.is_empty())
        .map(Value::Object)
        .collect();

    if rows.is_empty() {
        return Err(DatasheetError::EmptyImport);
    }

    tracing::debug!("Parsed {} rows from spreadsheet with {} columns", rows.len(), headers.len());
    Ok(Sheet { headers, rows })
}

fn header_text(cell: &Data) -> String {
    match cell_value(cell) {
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

fn cell_value(cell: &Data) -> Option<Value> {
    match cell {
        Data::Empty => None,
        Data::String(s) if s.is_empty() => None,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Some(Value::String(s.clone())),
        Data::Int(i) => Some(Value::from(*i)),
        Data::Float(f) => number_value(*f),
        Data::Bool(b) => Some(Value::Bool(*b)),
        Data::DateTime(dt) => number_value(dt.as_f64()),
        Data::Error(e) => Some(Value::String(e.to_string())),
    }
}

fn invalid_spreadsheet(e: impl std::fmt::Display) -> DatasheetError {
    DatasheetError::InvalidSpreadsheet(e.to_string())
}
