use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{postgres::PgRow, FromRow, Row};
use uuid::Uuid;

/// Value type of a datasheet column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    Number,
    Date,
    Boolean,
    Text,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Number => "number",
            DataType::Date => "date",
            DataType::Boolean => "boolean",
            DataType::Text => "text",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(DataType::String),
            "number" => Some(DataType::Number),
            "date" => Some(DataType::Date),
            "boolean" => Some(DataType::Boolean),
            "text" => Some(DataType::Text),
            _ => None,
        }
    }
}

impl Default for DataType {
    fn default() -> Self {
        DataType::String
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field definition owned by an experiment.
///
/// `field_name` is the only key row data is addressed by; `display_name` is a
/// label (CSV header, inference source key) and may contain anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDefinition {
    pub id: Uuid,
    pub experiment_id: Uuid,
    pub field_name: String,
    pub display_name: String,
    pub data_type: DataType,
    pub is_required: bool,
    pub constraints: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Column as supplied by a caller, before it is stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewColumn {
    pub field_name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub data_type: DataType,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub constraints: Option<Value>,
}

impl NewColumn {
    pub fn new(field_name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            field_name: field_name.into(),
            display_name: None,
            data_type,
            is_required: false,
            constraints: None,
        }
    }

    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    /// Label used when none was given
    pub fn resolved_display_name(&self) -> String {
        self.display_name
            .clone()
            .unwrap_or_else(|| self.field_name.clone())
    }

    pub fn into_definition(self, experiment_id: Uuid, now: DateTime<Utc>) -> ColumnDefinition {
        ColumnDefinition {
            id: Uuid::new_v4(),
            experiment_id,
            display_name: self.resolved_display_name(),
            field_name: self.field_name,
            data_type: self.data_type,
            is_required: self.is_required,
            constraints: self.constraints,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial column update; absent fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnUpdate {
    pub field_name: Option<String>,
    pub display_name: Option<String>,
    pub data_type: Option<DataType>,
    pub is_required: Option<bool>,
    pub constraints: Option<Value>,
}

impl ColumnUpdate {
    pub fn apply(&self, column: &mut ColumnDefinition, now: DateTime<Utc>) {
        if let Some(field_name) = &self.field_name {
            column.field_name = field_name.clone();
        }
        if let Some(display_name) = &self.display_name {
            column.display_name = display_name.clone();
        }
        if let Some(data_type) = self.data_type {
            column.data_type = data_type;
        }
        if let Some(is_required) = self.is_required {
            column.is_required = is_required;
        }
        if let Some(constraints) = &self.constraints {
            column.constraints = Some(constraints.clone());
        }
        column.updated_at = now;
    }
}

impl<'r> FromRow<'r, PgRow> for ColumnDefinition {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let data_type: String = row.try_get("data_type")?;
        let data_type = DataType::parse(&data_type).ok_or_else(|| sqlx::Error::ColumnDecode {
            index: "data_type".to_string(),
            source: format!("unknown data type: {}", data_type).into(),
        })?;

        Ok(Self {
            id: row.try_get("id")?,
            experiment_id: row.try_get("experiment_id")?,
            field_name: row.try_get("field_name")?,
            display_name: row.try_get("display_name")?,
            data_type,
            is_required: row.try_get("is_required")?,
            constraints: row.try_get("constraints")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}
