//! Schema-driven validation of raw row objects.
//!
//! `validate` is pure: it reads the raw record and the active columns and
//! produces a record holding only known fields, coerced to their column type.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Number, Value};

use super::error::{DatasheetError, DatasheetResult};
use crate::database::models::{ColumnDefinition, DataType, RowData};

/// Largest magnitude a JavaScript `Date` accepts, in epoch milliseconds
const MAX_EPOCH_MILLIS: f64 = 8.64e15;

/// Validate and coerce `raw` against `columns`, in column order.
/// Keys without a column are dropped; absent optional keys stay absent.
pub fn validate(raw: &RowData, columns: &[ColumnDefinition]) -> DatasheetResult<RowData> {
    let mut validated = RowData::new();

    for column in columns {
        let value = raw.get(&column.field_name);

        if column.is_required && is_blank(value) {
            return Err(DatasheetError::RequiredFieldMissing {
                field_name: column.field_name.clone(),
                display_name: column.display_name.clone(),
            });
        }

        let Some(value) = value.filter(|v| !v.is_null()) else {
            continue;
        };

        let coerced = match column.data_type {
            DataType::Number => coerce_number(value).ok_or_else(|| DatasheetError::InvalidNumber {
                field_name: column.field_name.clone(),
                display_name: column.display_name.clone(),
            })?,
            DataType::Boolean => coerce_boolean(value).ok_or_else(|| DatasheetError::InvalidBoolean {
                field_name: column.field_name.clone(),
                display_name: column.display_name.clone(),
            })?,
            DataType::Date => {
                if !is_valid_date(value) {
                    return Err(DatasheetError::InvalidDate {
                        field_name: column.field_name.clone(),
                        display_name: column.display_name.clone(),
                    });
                }
                value.clone()
            }
            DataType::String | DataType::Text => Value::String(coerce_string(value)),
        };

        validated.insert(column.field_name.clone(), coerced);
    }

    Ok(validated)
}

/// Validate a batch, attributing failures to their zero-based row index
pub fn validate_rows(rows: &[RowData], columns: &[ColumnDefinition]) -> DatasheetResult<Vec<RowData>> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| validate(row, columns).map_err(|e| e.in_row(index)))
        .collect()
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

/// `Number(value)` semantics, restricted to finite results
fn coerce_number(value: &Value) -> Option<Value> {
    let n = match value {
        Value::Number(n) => return Some(Value::Number(n.clone())),
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::String(s) => parse_js_number(s)?,
        _ => return None,
    };
    number_value(n)
}

fn parse_js_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }

    let radix = match trimmed.get(..2).map(str::to_ascii_lowercase).as_deref() {
        Some("0x") => Some(16),
        Some("0o") => Some(8),
        Some("0b") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        return parse_radix(&trimmed[2..], radix);
    }

    // Rust also accepts "inf"/"nan" spellings; JS only knows "Infinity"
    // and neither is finite, so both end up rejected
    let n: f64 = trimmed.parse().ok()?;
    n.is_finite().then_some(n)
}

/// Digits of a `0x`/`0o`/`0b` literal, accumulated in floating point so wide
/// literals round instead of overflowing
fn parse_radix(digits: &str, radix: u32) -> Option<f64> {
    if digits.is_empty() {
        return None;
    }
    digits
        .chars()
        .try_fold(0.0_f64, |acc, c| c.to_digit(radix).map(|d| acc * radix as f64 + d as f64))
}

/// Integral values inside i64 range stay integers on the wire
pub(crate) fn number_value(n: f64) -> Option<Value> {
    if !n.is_finite() {
        return None;
    }
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        return Some(Value::Number(Number::from(n as i64)));
    }
    Number::from_f64(n).map(Value::Number)
}

fn coerce_boolean(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(b) => Some(Value::Bool(*b)),
        Value::String(s) if s == "true" => Some(Value::Bool(true)),
        Value::String(s) if s == "false" => Some(Value::Bool(false)),
        _ => None,
    }
}

fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn is_valid_date(value: &Value) -> bool {
    match value {
        Value::String(s) => parse_date(s.trim()),
        Value::Number(n) => n.as_f64().is_some_and(|ms| ms.is_finite() && ms.abs() <= MAX_EPOCH_MILLIS),
        _ => false,
    }
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%Y-%m"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

fn parse_date(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    if DateTime::parse_from_rfc3339(s).is_ok() || DateTime::parse_from_rfc2822(s).is_ok() {
        return true;
    }
    if DATETIME_FORMATS
        .iter()
        .any(|fmt| NaiveDateTime::parse_from_str(s, fmt).is_ok())
    {
        return true;
    }
    if DATE_FORMATS.iter().any(|fmt| {
        // "%Y-%m" has no day; chrono needs one to build a date
        if *fmt == "%Y-%m" {
            NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d").is_ok()
        } else {
            NaiveDate::parse_from_str(s, fmt).is_ok()
        }
    }) {
        return true;
    }
    // Bare year, as `new Date("2024")` accepts
    s.len() == 4 && s.chars().all(|c| c.is_ascii_digit())
}
