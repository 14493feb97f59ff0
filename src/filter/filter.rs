use serde_json::Value;
use uuid::Uuid;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{FilterData, FilterOrderInfo, FilterWhereInfo, SqlResult};
use crate::database::models::ExperimentData;

pub const DEFAULT_LIMIT: u32 = 10;

const DATA_COLUMNS: &str = "\"id\", \"experiment_id\", \"data\", \"created_at\", \"updated_at\"";

/// Validated row query: JSON equality filters, one sort key, 1-indexed paging
#[derive(Debug, Clone)]
pub struct Filter {
    where_data: Vec<FilterWhereInfo>,
    order_data: FilterOrderInfo,
    page: u32,
    limit: u32,
}

impl Default for Filter {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter {
    pub fn new() -> Self {
        Self {
            where_data: vec![],
            order_data: FilterOrderInfo::default(),
            page: 1,
            limit: DEFAULT_LIMIT,
        }
    }

    pub fn from_data(data: FilterData) -> Result<Self, FilterError> {
        let mut filter = Self::new();
        filter.assign(data)?;
        Ok(filter)
    }

    pub fn assign(&mut self, data: FilterData) -> Result<&mut Self, FilterError> {
        self.where_clause(&data.filters)?;
        self.order(data.sort_by.as_deref(), data.sort_order.as_deref())?;
        let default_limit = crate::config::CONFIG.query.default_limit;
        self.paginate(data.page.unwrap_or(1), data.limit.unwrap_or(default_limit))?;
        Ok(self)
    }

    pub fn where_clause(
        &mut self,
        filters: &std::collections::BTreeMap<String, Value>,
    ) -> Result<&mut Self, FilterError> {
        self.where_data = FilterWhere::parse(filters)?;
        Ok(self)
    }

    pub fn order(
        &mut self,
        sort_by: Option<&str>,
        sort_order: Option<&str>,
    ) -> Result<&mut Self, FilterError> {
        self.order_data = FilterOrder::validate_and_parse(sort_by, sort_order)?;
        Ok(self)
    }

    pub fn paginate(&mut self, page: u32, limit: u32) -> Result<&mut Self, FilterError> {
        if page < 1 {
            return Err(FilterError::InvalidPage("Page must be at least 1".to_string()));
        }
        if limit < 1 {
            return Err(FilterError::InvalidLimit("Limit must be at least 1".to_string()));
        }

        // Apply max limit from config
        let max_limit = crate::config::CONFIG.query.max_limit.unwrap_or(u32::MAX);
        let applied_limit = if limit > max_limit {
            if crate::config::CONFIG.query.debug_logging {
                tracing::warn!("Limit {} exceeds max {}, capping to max", limit, max_limit);
            }
            max_limit
        } else {
            limit
        };

        self.page = page;
        self.limit = applied_limit;
        Ok(self)
    }

    pub fn conditions(&self) -> &[FilterWhereInfo] {
        &self.where_data
    }

    pub fn order_info(&self) -> &FilterOrderInfo {
        &self.order_data
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.limit as u64
    }

    /// Paged SELECT scoped to one experiment (`$1`)
    pub fn to_sql(&self, experiment_id: Uuid) -> SqlResult {
        let where_result = self.to_where_sql(experiment_id);
        let query = [
            format!("SELECT {}", DATA_COLUMNS),
            "FROM \"experiment_data\"".to_string(),
            format!("WHERE {}", where_result.query),
            FilterOrder::generate(&self.order_data),
            format!("LIMIT {} OFFSET {}", self.limit, self.offset()),
        ]
        .join(" ");
        SqlResult { query, params: where_result.params }
    }

    pub fn to_where_sql(&self, experiment_id: Uuid) -> SqlResult {
        let (clauses, mut params) = FilterWhere::generate(&self.where_data, 1);
        params.insert(0, Value::String(experiment_id.to_string()));
        let mut conditions = vec!["\"experiment_id\" = $1::uuid".to_string()];
        conditions.extend(clauses);
        SqlResult { query: conditions.join(" AND "), params }
    }

    pub fn to_count_sql(&self, experiment_id: Uuid) -> SqlResult {
        let where_result = self.to_where_sql(experiment_id);
        SqlResult {
            query: format!(
                "SELECT COUNT(*) AS count FROM \"experiment_data\" WHERE {}",
                where_result.query
            ),
            params: where_result.params,
        }
    }

    /// Evaluate against rows held in memory, given in insertion order.
    /// Returns the total match count and the requested page.
    pub fn apply<'a, I>(&self, rows: I) -> (u64, Vec<ExperimentData>)
    where
        I: IntoIterator<Item = &'a ExperimentData>,
    {
        let mut matched: Vec<(&ExperimentData, u64)> = rows
            .into_iter()
            .enumerate()
            .filter(|(_, row)| FilterWhere::matches(&self.where_data, &row.data))
            .map(|(seq, row)| (row, seq as u64))
            .collect();

        matched.sort_by(|a, b| FilterOrder::compare(&self.order_data, *a, *b));

        let total = matched.len() as u64;
        let page = matched
            .into_iter()
            .skip(self.offset() as usize)
            .take(self.limit as usize)
            .map(|(row, _)| row.clone())
            .collect();
        (total, page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use serde_json::json;

    fn rows() -> Vec<ExperimentData> {
        let exp = Uuid::new_v4();
        let base = Utc::now();
        (0..5)
            .map(|i| {
                let group = if i % 2 == 0 { "even" } else { "odd" };
                let data = json!({ "idx": i, "group": group })
                    .as_object()
                    .cloned()
                    .unwrap();
                ExperimentData::new(exp, data, base + Duration::seconds(i))
            })
            .collect()
    }

    #[test]
    fn builds_scoped_sql() {
        let filter = Filter::from_data(
            FilterData::default()
                .filter("group", "even")
                .sort("idx", "desc")
                .paginate(2, 2),
        )
        .unwrap();
        let exp = Uuid::nil();
        let sql = filter.to_sql(exp);
        assert_eq!(
            sql.query,
            "SELECT \"id\", \"experiment_id\", \"data\", \"created_at\", \"updated_at\" \
             FROM \"experiment_data\" \
             WHERE \"experiment_id\" = $1::uuid AND (\"data\" ->> 'group') = $2 \
             ORDER BY (\"data\" ->> 'idx') COLLATE \"C\" DESC NULLS LAST, \"seq\" DESC \
             LIMIT 2 OFFSET 2"
        );
        assert_eq!(sql.params, vec![json!(exp.to_string()), json!("even")]);

        let count = filter.to_count_sql(exp);
        assert!(count.query.starts_with("SELECT COUNT(*) AS count FROM \"experiment_data\" WHERE"));
        assert_eq!(count.params.len(), 2);
    }

    #[test]
    fn rejects_zero_page_and_limit() {
        assert!(matches!(
            Filter::from_data(FilterData::default().paginate(0, 10)),
            Err(FilterError::InvalidPage(_))
        ));
        assert!(matches!(
            Filter::from_data(FilterData::default().paginate(1, 0)),
            Err(FilterError::InvalidLimit(_))
        ));
    }

    #[test]
    fn applies_in_memory_with_default_order() {
        let rows = rows();
        let filter = Filter::from_data(FilterData::default().paginate(1, 2)).unwrap();
        let (total, page) = filter.apply(&rows);
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].data["idx"], json!(4));
        assert_eq!(page[1].data["idx"], json!(3));
    }

    #[test]
    fn applies_filter_and_json_sort() {
        let rows = rows();
        let filter = Filter::from_data(
            FilterData::default().filter("group", "even").sort("idx", "ASC"),
        )
        .unwrap();
        let (total, page) = filter.apply(&rows);
        assert_eq!(total, 3);
        let idx: Vec<_> = page.iter().map(|r| r.data["idx"].clone()).collect();
        assert_eq!(idx, vec![json!(0), json!(2), json!(4)]);
    }
}
