use std::cmp::Ordering;

use super::error::FilterError;
use super::types::{is_identifier, json_text, FilterOrderInfo, SortDirection, SortKey};
use crate::database::models::ExperimentData;

pub struct FilterOrder;

impl FilterOrder {
    /// No `sort_by` means newest first; a given `sort_by` defaults to ascending
    pub fn validate_and_parse(
        sort_by: Option<&str>,
        sort_order: Option<&str>,
    ) -> Result<FilterOrderInfo, FilterError> {
        let Some(sort_by) = sort_by.filter(|s| !s.is_empty()) else {
            return Ok(FilterOrderInfo::default());
        };

        let key = match sort_by {
            "id" => SortKey::Id,
            "createdAt" => SortKey::CreatedAt,
            "updatedAt" => SortKey::UpdatedAt,
            field if is_identifier(field) => SortKey::Field(field.to_string()),
            other => return Err(FilterError::InvalidSortField(other.to_string())),
        };

        let sort = match sort_order.map(str::trim).filter(|s| !s.is_empty()) {
            None => SortDirection::Asc,
            Some(dir) if dir.eq_ignore_ascii_case("asc") => SortDirection::Asc,
            Some(dir) if dir.eq_ignore_ascii_case("desc") => SortDirection::Desc,
            Some(other) => return Err(FilterError::InvalidSortOrder(other.to_string())),
        };

        Ok(FilterOrderInfo { key, sort })
    }

    /// ORDER BY clause; JSON values sort by byte order of their text form with
    /// missing values first ascending, and `seq` breaks ties by insertion order
    pub fn generate(info: &FilterOrderInfo) -> String {
        let dir = info.sort.to_sql();
        let primary = match &info.key {
            SortKey::Id => format!("\"id\" {}", dir),
            SortKey::CreatedAt => format!("\"created_at\" {}", dir),
            SortKey::UpdatedAt => format!("\"updated_at\" {}", dir),
            SortKey::Field(field) => {
                let nulls = match info.sort {
                    SortDirection::Asc => "NULLS FIRST",
                    SortDirection::Desc => "NULLS LAST",
                };
                format!("(\"data\" ->> '{}') COLLATE \"C\" {} {}", field, dir, nulls)
            }
        };
        format!("ORDER BY {}, \"seq\" {}", primary, dir)
    }

    /// In-memory ordering matching [`FilterOrder::generate`]. `seq_a`/`seq_b`
    /// are insertion positions.
    pub fn compare(
        info: &FilterOrderInfo,
        (a, seq_a): (&ExperimentData, u64),
        (b, seq_b): (&ExperimentData, u64),
    ) -> Ordering {
        let primary = match &info.key {
            SortKey::Id => a.id.cmp(&b.id),
            SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
            SortKey::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            SortKey::Field(field) => {
                let va = a.data.get(field).and_then(json_text);
                let vb = b.data.get(field).and_then(json_text);
                va.cmp(&vb)
            }
        };
        let ordering = primary.then(seq_a.cmp(&seq_b));
        match info.sort {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_created_desc() {
        let info = FilterOrder::validate_and_parse(None, Some("asc")).unwrap();
        assert_eq!(info.key, SortKey::CreatedAt);
        assert_eq!(info.sort, SortDirection::Desc);
    }

    #[test]
    fn top_level_and_json_keys() {
        let info = FilterOrder::validate_and_parse(Some("updatedAt"), Some("DESC")).unwrap();
        assert_eq!(info.key, SortKey::UpdatedAt);
        assert_eq!(info.sort, SortDirection::Desc);

        let info = FilterOrder::validate_and_parse(Some("weight"), None).unwrap();
        assert_eq!(info.key, SortKey::Field("weight".into()));
        assert_eq!(info.sort, SortDirection::Asc);
    }

    #[test]
    fn rejects_bad_sort_input() {
        assert_eq!(
            FilterOrder::validate_and_parse(Some("data.weight"), None).unwrap_err(),
            FilterError::InvalidSortField("data.weight".into())
        );
        assert_eq!(
            FilterOrder::validate_and_parse(Some("weight"), Some("sideways")).unwrap_err(),
            FilterError::InvalidSortOrder("sideways".into())
        );
    }

    #[test]
    fn generates_json_order_clause() {
        let info = FilterOrder::validate_and_parse(Some("weight"), Some("desc")).unwrap();
        assert_eq!(
            FilterOrder::generate(&info),
            "ORDER BY (\"data\" ->> 'weight') COLLATE \"C\" DESC NULLS LAST, \"seq\" DESC"
        );
        let info = FilterOrderInfo::default();
        assert_eq!(FilterOrder::generate(&info), "ORDER BY \"created_at\" DESC, \"seq\" DESC");
    }
}
