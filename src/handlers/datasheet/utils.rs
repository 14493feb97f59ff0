use std::collections::HashMap;

use serde_json::Value;

use crate::datasheet::DatasheetError;
use crate::filter::FilterData;

/// Query parameters with a fixed meaning; everything else is a data filter
const RESERVED_PARAMS: &[&str] = &["page", "limit", "sortBy", "sortOrder"];

/// Split raw query parameters into paging, sorting and equality filters
pub fn filter_data_from_query(params: HashMap<String, String>) -> Result<FilterData, DatasheetError> {
    let mut data = FilterData {
        page: parse_positive(&params, "page")?,
        limit: parse_positive(&params, "limit")?,
        sort_by: params.get("sortBy").filter(|s| !s.is_empty()).cloned(),
        sort_order: params.get("sortOrder").filter(|s| !s.is_empty()).cloned(),
        ..Default::default()
    };

    for (key, value) in params {
        if !RESERVED_PARAMS.contains(&key.as_str()) {
            data.filters.insert(key, Value::String(value));
        }
    }
    Ok(data)
}

fn parse_positive(params: &HashMap<String, String>, key: &str) -> Result<Option<u32>, DatasheetError> {
    match params.get(key).map(|s| s.trim()).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u32>()
            .map(Some)
            .map_err(|_| DatasheetError::InvalidPagination(format!("{} must be a positive integer, got '{}'", key, raw))),
    }
}

/// Treat `?name=` the same as an absent parameter
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn splits_reserved_params_from_filters() {
        let data = filter_data_from_query(params(&[
            ("page", "2"),
            ("limit", "5"),
            ("sortBy", "weight"),
            ("sortOrder", "desc"),
            ("group", "A"),
        ]))
        .unwrap();
        assert_eq!(data.page, Some(2));
        assert_eq!(data.limit, Some(5));
        assert_eq!(data.sort_by.as_deref(), Some("weight"));
        assert_eq!(data.sort_order.as_deref(), Some("desc"));
        assert_eq!(data.filters.len(), 1);
        assert_eq!(data.filters["group"], Value::String("A".into()));
    }

    #[test]
    fn rejects_non_numeric_paging() {
        let err = filter_data_from_query(params(&[("page", "two")])).unwrap_err();
        assert_eq!(err.code(), "INVALID_PAGINATION");
        let err = filter_data_from_query(params(&[("limit", "-1")])).unwrap_err();
        assert_eq!(err.code(), "INVALID_PAGINATION");
    }
}
