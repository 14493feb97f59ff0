use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Invalid filter key: {0}")]
    InvalidFilterKey(String),

    #[error("Invalid sortBy field: {0}")]
    InvalidSortField(String),

    #[error("Invalid sortOrder: {0}")]
    InvalidSortOrder(String),

    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    #[error("Invalid page: {0}")]
    InvalidPage(String),
}
