use thiserror::Error;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::filter::error::FilterError;

/// Error categories surfaced to callers; the transport maps these to status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    InvalidQueryParam,
    UnsupportedFormat,
    Persistence,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::InvalidQueryParam => "INVALID_QUERY_PARAM",
            ErrorKind::UnsupportedFormat => "UNSUPPORTED_FORMAT",
            ErrorKind::Persistence => "PERSISTENCE_ERROR",
        }
    }
}

#[derive(Debug, Error)]
pub enum DatasheetError {
    #[error("Experiment not found: {0}")]
    ExperimentNotFound(Uuid),

    #[error("Column not found: {0}")]
    ColumnNotFound(Uuid),

    #[error("Data record not found: {0}")]
    DataNotFound(Uuid),

    #[error("Experiment name is required")]
    ExperimentNameRequired,

    #[error("Invalid field name: '{0}'. Only alphanumeric characters and underscores are allowed.")]
    InvalidFieldName(String),

    #[error("Field name '{0}' is a reserved keyword.")]
    ReservedFieldName(String),

    #[error("Field name '{0}' is already defined for this experiment.")]
    DuplicateFieldName(String),

    #[error("No column definitions found for this experiment")]
    NoColumnsDefined,

    #[error("No data to infer columns from")]
    EmptyImport,

    #[error("Field '{display_name}' ({field_name}) is required")]
    RequiredFieldMissing { field_name: String, display_name: String },

    #[error("Field '{display_name}' must be a number")]
    InvalidNumber { field_name: String, display_name: String },

    #[error("Field '{display_name}' must be a boolean")]
    InvalidBoolean { field_name: String, display_name: String },

    #[error("Field '{display_name}' must be a valid date")]
    InvalidDate { field_name: String, display_name: String },

    #[error("Record must be a JSON object")]
    InvalidRecord,

    #[error("Row {index}: {source}")]
    RowInvalid {
        index: usize,
        #[source]
        source: Box<DatasheetError>,
    },

    #[error("Invalid spreadsheet: {0}")]
    InvalidSpreadsheet(String),

    #[error("Invalid filter key: {0}")]
    InvalidFilterKey(String),

    #[error("Invalid sortBy field: {0}")]
    InvalidSortField(String),

    #[error("Invalid sortOrder: {0}")]
    InvalidSortOrder(String),

    #[error("Invalid pagination: {0}")]
    InvalidPagination(String),

    #[error("Unsupported export format: {0}. Only CSV export is currently supported")]
    UnsupportedExportFormat(String),

    #[error("Failed to fetch experiment data: {0}")]
    QueryFailed(String),

    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl DatasheetError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DatasheetError::ExperimentNotFound(_)
            | DatasheetError::ColumnNotFound(_)
            | DatasheetError::DataNotFound(_) => ErrorKind::NotFound,

            DatasheetError::InvalidFilterKey(_)
            | DatasheetError::InvalidSortField(_)
            | DatasheetError::InvalidSortOrder(_)
            | DatasheetError::InvalidPagination(_) => ErrorKind::InvalidQueryParam,

            DatasheetError::UnsupportedExportFormat(_) => ErrorKind::UnsupportedFormat,

            DatasheetError::QueryFailed(_) | DatasheetError::Persistence(_) => ErrorKind::Persistence,

            DatasheetError::RowInvalid { source, .. } => source.kind(),

            _ => ErrorKind::Validation,
        }
    }

    /// Specific machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            DatasheetError::ExperimentNotFound(_) => "EXPERIMENT_NOT_FOUND",
            DatasheetError::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            DatasheetError::DataNotFound(_) => "DATA_NOT_FOUND",
            DatasheetError::ExperimentNameRequired => "EXPERIMENT_NAME_REQUIRED",
            DatasheetError::InvalidFieldName(_) => "INVALID_FIELD_NAME",
            DatasheetError::ReservedFieldName(_) => "RESERVED_FIELD_NAME",
            DatasheetError::DuplicateFieldName(_) => "DUPLICATE_FIELD_NAME",
            DatasheetError::NoColumnsDefined => "NO_COLUMNS_DEFINED",
            DatasheetError::EmptyImport => "EMPTY_IMPORT",
            DatasheetError::RequiredFieldMissing { .. } => "REQUIRED_FIELD_MISSING",
            DatasheetError::InvalidNumber { .. } => "INVALID_NUMBER",
            DatasheetError::InvalidBoolean { .. } => "INVALID_BOOLEAN",
            DatasheetError::InvalidDate { .. } => "INVALID_DATE",
            DatasheetError::InvalidRecord => "INVALID_RECORD",
            DatasheetError::RowInvalid { .. } => "ROW_INVALID",
            DatasheetError::InvalidSpreadsheet(_) => "INVALID_SPREADSHEET",
            DatasheetError::InvalidFilterKey(_) => "INVALID_FILTER_KEY",
            DatasheetError::InvalidSortField(_) => "INVALID_SORT_FIELD",
            DatasheetError::InvalidSortOrder(_) => "INVALID_SORT_ORDER",
            DatasheetError::InvalidPagination(_) => "INVALID_PAGINATION",
            DatasheetError::UnsupportedExportFormat(_) => "UNSUPPORTED_EXPORT_FORMAT",
            DatasheetError::QueryFailed(_) => "QUERY_FAILED",
            DatasheetError::Persistence(_) => "PERSISTENCE_ERROR",
        }
    }

    /// Innermost error, unwrapping batch row context
    pub fn root(&self) -> &DatasheetError {
        match self {
            DatasheetError::RowInvalid { source, .. } => source.root(),
            other => other,
        }
    }

    /// Row index for errors raised inside a batch
    pub fn row_index(&self) -> Option<usize> {
        match self {
            DatasheetError::RowInvalid { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Field the error is about, if any
    pub fn field_name(&self) -> Option<&str> {
        match self.root() {
            DatasheetError::RequiredFieldMissing { field_name, .. }
            | DatasheetError::InvalidNumber { field_name, .. }
            | DatasheetError::InvalidBoolean { field_name, .. }
            | DatasheetError::InvalidDate { field_name, .. } => Some(field_name),
            DatasheetError::InvalidFieldName(name)
            | DatasheetError::ReservedFieldName(name)
            | DatasheetError::DuplicateFieldName(name) => Some(name),
            _ => None,
        }
    }

    pub fn in_row(self, index: usize) -> Self {
        DatasheetError::RowInvalid { index, source: Box::new(self) }
    }
}

impl From<DatabaseError> for DatasheetError {
    fn from(err: DatabaseError) -> Self {
        DatasheetError::Persistence(err.to_string())
    }
}

impl From<sqlx::Error> for DatasheetError {
    fn from(err: sqlx::Error) -> Self {
        DatasheetError::Persistence(err.to_string())
    }
}

impl From<FilterError> for DatasheetError {
    fn from(err: FilterError) -> Self {
        match err {
            FilterError::InvalidFilterKey(key) => DatasheetError::InvalidFilterKey(key),
            FilterError::InvalidSortField(field) => DatasheetError::InvalidSortField(field),
            FilterError::InvalidSortOrder(order) => DatasheetError::InvalidSortOrder(order),
            FilterError::InvalidLimit(msg) | FilterError::InvalidPage(msg) => {
                DatasheetError::InvalidPagination(msg)
            }
        }
    }
}

pub type DatasheetResult<T> = Result<T, DatasheetError>;
