use std::str::FromStr;

use serde_json::Value;

use super::error::DatasheetError;
use crate::database::models::{ColumnDefinition, ExperimentData};

pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

/// Export formats the datasheet can render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
}

impl FromStr for ExportFormat {
    type Err = DatasheetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("csv") {
            Ok(ExportFormat::Csv)
        } else {
            Err(DatasheetError::UnsupportedExportFormat(s.to_string()))
        }
    }
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => CSV_CONTENT_TYPE,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
        }
    }
}

/// Rendered export, ready to hand to a transport
#[derive(Debug, Clone, PartialEq)]
pub struct ExportFile {
    pub file_name: String,
    pub content_type: &'static str,
    pub body: String,
}

impl ExportFile {
    /// `Content-Disposition` value carrying the percent-encoded file name
    pub fn content_disposition(&self) -> String {
        let encoded = encode_uri_component(&self.file_name);
        format!("attachment; filename=\"{}\"; filename*=UTF-8''{}", encoded, encoded)
    }
}

/// Render rows as CSV: BOM, display-name header, one line per record.
/// Rows are joined with `\n` and there is no trailing newline.
pub fn render_csv(columns: &[ColumnDefinition], records: &[ExperimentData]) -> String {
    let header = columns
        .iter()
        .map(|c| c.display_name.as_str())
        .collect::<Vec<_>>()
        .join(",");

    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(header);
    for record in records {
        let line = columns
            .iter()
            .map(|c| escape_cell(record.data.get(&c.field_name)))
            .collect::<Vec<_>>()
            .join(",");
        lines.push(line);
    }

    format!("\u{FEFF}{}", lines.join("\n"))
}

/// Missing and null become empty; quotes double; cells holding a comma,
/// quote or newline are wrapped in quotes
pub fn escape_cell(value: Option<&Value>) -> String {
    let text = match value {
        None | Some(Value::Null) => return String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };

    let escaped = text.replace('"', "\"\"");
    if escaped.contains(',') || escaped.contains('"') || escaped.contains('\n') {
        format!("\"{}\"", escaped)
    } else {
        escaped
    }
}

/// Percent-encode everything but `A-Z a-z 0-9 - _ . ! ~ * ' ( )`
pub fn encode_uri_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' => out.push(byte as char),
            b'-' | b'_' | b'.' | b'!' | b'~' | b'*' | b'\'' | b'(' | b')' => out.push(byte as char),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{DataType, NewColumn};
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn columns() -> Vec<ColumnDefinition> {
        let now = Utc::now();
        vec![
            NewColumn::new("sheep", DataType::String).display_name("Sheep").into_definition(Uuid::nil(), now),
            NewColumn::new("weight", DataType::Number).display_name("Weight (kg)").into_definition(Uuid::nil(), now),
        ]
    }

    fn record(data: Value) -> ExperimentData {
        ExperimentData::new(Uuid::nil(), data.as_object().cloned().unwrap(), Utc::now())
    }

    #[test]
    fn renders_header_and_rows() {
        let records = vec![
            record(json!({ "sheep": "A1", "weight": 41.5 })),
            record(json!({ "sheep": "say \"hi\", ok" })),
        ];
        let csv = render_csv(&columns(), &records);
        assert_eq!(csv, "\u{FEFF}Sheep,Weight (kg)\nA1,41.5\n\"say \"\"hi\"\", ok\",");
    }

    #[test]
    fn empty_export_is_header_only() {
        assert_eq!(render_csv(&columns(), &[]), "\u{FEFF}Sheep,Weight (kg)");
    }

    #[test]
    fn escapes_newlines_and_null() {
        assert_eq!(escape_cell(Some(&json!("a\nb"))), "\"a\nb\"");
        assert_eq!(escape_cell(Some(&Value::Null)), "");
        assert_eq!(escape_cell(None), "");
        assert_eq!(escape_cell(Some(&json!(true))), "true");
    }

    #[test]
    fn parses_format_case_insensitively() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        let err = "xlsx".parse::<ExportFormat>().unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_EXPORT_FORMAT");
    }

    #[test]
    fn encodes_file_names() {
        assert_eq!(encode_uri_component("Trial A.csv"), "Trial%20A.csv");
        assert_eq!(encode_uri_component("羊.csv"), "%E7%BE%8A.csv");
        let file = ExportFile {
            file_name: "a b.csv".into(),
            content_type: CSV_CONTENT_TYPE,
            body: String::new(),
        };
        assert_eq!(
            file.content_disposition(),
            "attachment; filename=\"a%20b.csv\"; filename*=UTF-8''a%20b.csv"
        );
    }
}
