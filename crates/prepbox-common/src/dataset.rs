//! Instructor-authored dataset descriptions.
//!
//! A [`Dataset`] names one practice table and carries up to three sources for
//! its contents: a SQL creation script, inline row objects (`data`, or the
//! `dataset_rows` array nested in `schema_info`), and raw CSV text. The loader
//! consults them in a fixed precedence and never merges them.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{ExerciseKind, JsonRow, JsonValue};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_sql: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_creation_sql: Option<String>,

    #[serde(
        default,
        alias = "csv_data",
        skip_serializing_if = "Option::is_none"
    )]
    pub dataset_csv_raw: Option<String>,

    /// Row objects, either as a JSON array or a string holding one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_info: Option<JsonValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_type: Option<ExerciseKind>,
}

impl Dataset {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_creation_sql(mut self, sql: impl Into<String>) -> Self {
        self.creation_sql = Some(sql.into());
        self
    }

    pub fn with_csv(mut self, csv: impl Into<String>) -> Self {
        self.dataset_csv_raw = Some(csv.into());
        self
    }

    pub fn with_rows(mut self, rows: Vec<JsonRow>) -> Self {
        self.data = Some(JsonValue::Array(
            rows.into_iter().map(JsonValue::Object).collect(),
        ));
        self
    }

    pub fn with_schema_info(mut self, schema_info: JsonValue) -> Self {
        self.schema_info = Some(schema_info);
        self
    }

    /// Sort key used by the signature builder: `id`, then `table_name`, then `name`.
    pub fn label(&self) -> &str {
        if !self.id.is_empty() {
            return &self.id;
        }
        if let Some(table) = self.table_name.as_deref().filter(|t| !t.is_empty()) {
            return table;
        }
        &self.name
    }

    pub fn identifier(&self) -> &str {
        match self.label() {
            "" => "unknown",
            label => label,
        }
    }

    /// The creation script, preferring `creation_sql` over `data_creation_sql`.
    pub fn creation_script(&self) -> Option<&str> {
        self.creation_sql
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.data_creation_sql.as_deref().filter(|s| !s.is_empty()))
    }

    pub fn declared_columns(&self) -> Option<&[String]> {
        self.columns.as_deref().filter(|c| !c.is_empty())
    }

    pub fn csv_text(&self) -> Option<&str> {
        self.dataset_csv_raw.as_deref().filter(|s| !s.trim().is_empty())
    }

    /// Name of the table this dataset materializes into.
    pub fn target_table(&self, position: usize) -> String {
        if let Some(table) = self.table_name.as_deref().filter(|t| !t.is_empty()) {
            return table.to_string();
        }
        let source = if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        };
        sanitize_table_name(source, position)
    }

    /// Rows from the `data` field.
    pub fn explicit_rows(&self) -> Result<Vec<JsonRow>> {
        match &self.data {
            None => Ok(Vec::new()),
            Some(value) => rows_from_json(value),
        }
    }

    /// Rows from `schema_info.dataset_rows`.
    pub fn schema_rows(&self) -> Result<Vec<JsonRow>> {
        let info = match &self.schema_info {
            None => return Ok(Vec::new()),
            Some(JsonValue::String(text)) => serde_json::from_str::<JsonValue>(text)?,
            Some(other) => other.clone(),
        };
        match info.get("dataset_rows") {
            Some(rows) => rows_from_json(rows),
            None => Ok(Vec::new()),
        }
    }

    /// Number of explicit rows, without failing on malformed input.
    pub fn row_count(&self) -> usize {
        self.explicit_rows().map(|rows| rows.len()).unwrap_or(0)
    }
}

fn rows_from_json(value: &JsonValue) -> Result<Vec<JsonRow>> {
    match value {
        JsonValue::Null => Ok(Vec::new()),
        JsonValue::String(text) => {
            if text.trim().is_empty() {
                return Ok(Vec::new());
            }
            let parsed: JsonValue = serde_json::from_str(text)?;
            rows_from_json(&parsed)
        }
        JsonValue::Array(items) => items
            .iter()
            .map(|item| match item {
                JsonValue::Object(row) => Ok(row.clone()),
                other => Err(Error::parse_failure(format!(
                    "expected a row object, found {}",
                    json_type_name(other)
                ))),
            })
            .collect(),
        other => Err(Error::parse_failure(format!(
            "expected an array of rows, found {}",
            json_type_name(other)
        ))),
    }
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// Derives a SQL-safe table name from a free-form dataset name.
///
/// Non-word characters become `_`, runs of `_` collapse, names that do not
/// start with a letter get a `table_` prefix and empty names fall back to
/// `dataset_<position>`.
pub fn sanitize_table_name(value: &str, position: usize) -> String {
    let mut normalized = String::with_capacity(value.len());
    for ch in value.trim().chars() {
        let ch = if ch.is_ascii_alphanumeric() || ch == '_' {
            ch
        } else {
            '_'
        };
        if ch == '_' && normalized.ends_with('_') {
            continue;
        }
        normalized.push(ch);
    }

    if normalized.is_empty() {
        return format!("dataset_{}", position);
    }
    if normalized
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
    {
        normalized
    } else {
        format!("table_{}", normalized)
    }
}
