//! Field-name rules shared by explicit column definitions and schema inference.

use std::collections::{HashMap, HashSet};

use super::error::{DatasheetError, DatasheetResult};
use crate::database::models::{ColumnDefinition, DataType, NewColumn};
use crate::filter::is_identifier;

/// Names that collide with record attributes
pub const RESERVED_FIELD_NAMES: &[&str] = &["id", "createdAt", "updatedAt", "data", "experimentId"];

/// Prefix applied to inferred names that would otherwise be invalid
pub const INFERRED_PREFIX: &str = "col_";

pub fn is_reserved(field_name: &str) -> bool {
    RESERVED_FIELD_NAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(field_name))
}

/// Check a caller-supplied field name
pub fn validate_field_name(field_name: &str) -> DatasheetResult<()> {
    if !is_identifier(field_name) {
        return Err(DatasheetError::InvalidFieldName(field_name.to_string()));
    }
    if is_reserved(field_name) {
        return Err(DatasheetError::ReservedFieldName(field_name.to_string()));
    }
    Ok(())
}

/// Validate a batch of new columns against each other and the existing schema
pub fn validate_new_columns(existing: &[ColumnDefinition], columns: &[NewColumn]) -> DatasheetResult<()> {
    let mut seen: HashSet<&str> = existing.iter().map(|c| c.field_name.as_str()).collect();
    for column in columns {
        validate_field_name(&column.field_name)?;
        if !seen.insert(column.field_name.as_str()) {
            return Err(DatasheetError::DuplicateFieldName(column.field_name.clone()));
        }
    }
    Ok(())
}

/// Map a raw spreadsheet/JSON key onto `[A-Za-z0-9_]`, prefixing names that
/// are empty, reserved or start with a digit
pub fn sanitize_field_name(raw: &str) -> String {
    let sanitized: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    let starts_with_digit = sanitized.chars().next().is_some_and(|c| c.is_ascii_digit());
    if sanitized.is_empty() || is_reserved(&sanitized) || starts_with_digit {
        format!("{}{}", INFERRED_PREFIX, sanitized)
    } else {
        sanitized
    }
}

/// Raw key → canonical field name
pub type KeyMap = HashMap<String, String>;

/// Columns inferred from the first row of an import, plus the raw key map
#[derive(Debug, Clone, PartialEq)]
pub struct InferredSchema {
    pub columns: Vec<NewColumn>,
    pub key_map: KeyMap,
}

/// Derive one optional string column per raw key, in key order.
/// Colliding sanitized names get `_1`, `_2`, ... suffixes.
pub fn infer_columns<'a, I>(raw_keys: I) -> InferredSchema
where
    I: IntoIterator<Item = &'a String>,
{
    let mut columns: Vec<NewColumn> = Vec::new();
    let mut key_map = KeyMap::new();

    for raw in raw_keys {
        if key_map.contains_key(raw) {
            continue;
        }
        let base = sanitize_field_name(raw);
        let mut unique = base.clone();
        let mut counter = 1;
        while columns.iter().any(|c| c.field_name == unique) {
            unique = format!("{}_{}", base, counter);
            counter += 1;
        }

        key_map.insert(raw.clone(), unique.clone());
        columns.push(NewColumn::new(unique, DataType::String).display_name(raw.clone()));
    }

    InferredSchema { columns, key_map }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn validates_explicit_names() {
        assert!(validate_field_name("weight_kg").is_ok());
        assert!(matches!(validate_field_name("weight kg"), Err(DatasheetError::InvalidFieldName(_))));
        assert!(matches!(validate_field_name(""), Err(DatasheetError::InvalidFieldName(_))));
        assert!(matches!(validate_field_name("ID"), Err(DatasheetError::ReservedFieldName(_))));
        assert!(matches!(validate_field_name("createdat"), Err(DatasheetError::ReservedFieldName(_))));
        assert!(matches!(validate_field_name("experimentId"), Err(DatasheetError::ReservedFieldName(_))));
    }

    #[test]
    fn rejects_duplicates_within_batch_and_schema() {
        let batch = vec![NewColumn::new("a", DataType::String), NewColumn::new("a", DataType::Number)];
        assert!(matches!(
            validate_new_columns(&[], &batch),
            Err(DatasheetError::DuplicateFieldName(name)) if name == "a"
        ));

        let existing = NewColumn::new("b", DataType::String)
            .into_definition(uuid::Uuid::new_v4(), chrono::Utc::now());
        let batch = vec![NewColumn::new("b", DataType::String)];
        assert!(validate_new_columns(&[existing], &batch).is_err());
    }

    #[test]
    fn sanitizes_raw_keys() {
        assert_eq!(sanitize_field_name("Sheep #"), "Sheep__");
        assert_eq!(sanitize_field_name("Weight (kg)"), "Weight__kg_");
        assert_eq!(sanitize_field_name("2023 weight"), "col_2023_weight");
        assert_eq!(sanitize_field_name(""), "col_");
        assert_eq!(sanitize_field_name("Data"), "col_Data");
        assert_eq!(sanitize_field_name("体重"), "__");
    }

    #[test]
    fn infers_unique_columns_in_key_order() {
        let raw = keys(&["a b", "a-b", "a_b", "id"]);
        let inferred = infer_columns(&raw);
        let names: Vec<_> = inferred.columns.iter().map(|c| c.field_name.as_str()).collect();
        assert_eq!(names, vec!["a_b", "a_b_1", "a_b_2", "col_id"]);

        let labels: Vec<_> = inferred.columns.iter().map(|c| c.resolved_display_name()).collect();
        assert_eq!(labels, raw);
        assert!(inferred.columns.iter().all(|c| c.data_type == DataType::String && !c.is_required));
        assert_eq!(inferred.key_map["a-b"], "a_b_1");
    }

    #[test]
    fn inferred_names_are_always_valid() {
        let raw = keys(&["Sheep #", "", "createdAt", "9lives", "ok"]);
        for column in infer_columns(&raw).columns {
            assert!(validate_field_name(&column.field_name).is_ok(), "{}", column.field_name);
        }
    }
}
