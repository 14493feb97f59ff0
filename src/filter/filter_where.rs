use std::collections::BTreeMap;

use serde_json::Value;

use super::error::FilterError;
use super::types::{is_identifier, json_text, FilterWhereInfo};
use crate::database::models::RowData;

pub struct FilterWhere {
    param_values: Vec<Value>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    /// Validate raw filter keys and normalize values to their text form
    pub fn parse(filters: &BTreeMap<String, Value>) -> Result<Vec<FilterWhereInfo>, FilterError> {
        let mut conditions = Vec::with_capacity(filters.len());
        for (key, value) in filters {
            if !is_identifier(key) {
                return Err(FilterError::InvalidFilterKey(key.clone()));
            }
            conditions.push(FilterWhereInfo {
                field: key.clone(),
                value: json_text(value),
            });
        }
        Ok(conditions)
    }

    /// Render conditions as SQL predicates over the `data` JSONB column.
    /// Keys are inlined (already validated as identifiers); values are bound.
    pub fn generate(
        conditions: &[FilterWhereInfo],
        starting_param_index: usize,
    ) -> (Vec<String>, Vec<Value>) {
        let mut filter_where = Self::new(starting_param_index);
        let clauses = conditions
            .iter()
            .map(|condition| filter_where.build_sql_condition(condition))
            .collect();
        (clauses, filter_where.param_values)
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> String {
        let extracted = format!("(\"data\" ->> '{}')", condition.field);
        match &condition.value {
            // `= NULL` never holds; keep the SQL honest about it
            None => "1=0".to_string(),
            Some(text) => format!("{} = {}", extracted, self.param(Value::String(text.clone()))),
        }
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }

    /// In-memory evaluation with the same semantics as the SQL rendering
    pub fn matches(conditions: &[FilterWhereInfo], data: &RowData) -> bool {
        conditions.iter().all(|condition| {
            let stored = data.get(&condition.field).and_then(json_text);
            match (&condition.value, stored) {
                (Some(expected), Some(actual)) => *expected == actual,
                _ => false,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filters(v: Value) -> BTreeMap<String, Value> {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn rejects_non_identifier_keys() {
        let err = FilterWhere::parse(&filters(json!({ "bad key": 1 }))).unwrap_err();
        assert_eq!(err, FilterError::InvalidFilterKey("bad key".into()));

        let err = FilterWhere::parse(&filters(json!({ "a') OR 1=1 --": 1 }))).unwrap_err();
        assert!(matches!(err, FilterError::InvalidFilterKey(_)));
    }

    #[test]
    fn generates_bound_json_predicates() {
        let conditions = FilterWhere::parse(&filters(json!({ "sheep": "S1", "weight": 10.5 }))).unwrap();
        let (clauses, params) = FilterWhere::generate(&conditions, 1);
        assert_eq!(
            clauses,
            vec![
                "(\"data\" ->> 'sheep') = $2".to_string(),
                "(\"data\" ->> 'weight') = $3".to_string(),
            ]
        );
        assert_eq!(params, vec![json!("S1"), json!("10.5")]);
    }

    #[test]
    fn matches_by_text_form() {
        let conditions = FilterWhere::parse(&filters(json!({ "weight": "10.5" }))).unwrap();
        let row = json!({ "weight": 10.5 }).as_object().cloned().unwrap();
        assert!(FilterWhere::matches(&conditions, &row));

        let other = json!({ "weight": 11 }).as_object().cloned().unwrap();
        assert!(!FilterWhere::matches(&conditions, &other));

        let missing = json!({}).as_object().cloned().unwrap();
        assert!(!FilterWhere::matches(&conditions, &missing));
    }
}
