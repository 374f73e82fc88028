use serde::de::{self, Deserializer};
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};

use crate::types::JsonValue;

/// Tabular output of a SQL statement, cells already converted to JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<JsonValue>>,
    pub row_count: usize,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<JsonValue>>) -> Self {
        let row_count = rows.len();
        Self {
            columns,
            rows,
            row_count,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&JsonValue> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    pub fn get_by_name(&self, row: usize, col_name: &str) -> Option<&JsonValue> {
        let col_idx = self.columns.iter().position(|c| c == col_name)?;
        self.get(row, col_idx)
    }

    pub fn first_value(&self) -> Option<&JsonValue> {
        self.get(0, 0)
    }

    /// Values of the first column as strings, skipping nulls.
    pub fn first_column_strings(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|row| match row.first() {
                Some(JsonValue::String(s)) => Some(s.clone()),
                Some(JsonValue::Null) | None => None,
                Some(other) => Some(other.to_string()),
            })
            .collect()
    }
}

/// The normalized outcome of running learner code.
///
/// Serializes to `{success: true, output}`, `{success: true, result}` or
/// `{success: false, error}`; a payload and an error never appear together.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    Output(String),
    Table(QueryResult),
    Failure(String),
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        !matches!(self, ExecutionResult::Failure(_))
    }

    pub fn output(&self) -> Option<&str> {
        match self {
            ExecutionResult::Output(out) => Some(out),
            ExecutionResult::Table(_) | ExecutionResult::Failure(_) => None,
        }
    }

    pub fn table(&self) -> Option<&QueryResult> {
        match self {
            ExecutionResult::Table(result) => Some(result),
            ExecutionResult::Output(_) | ExecutionResult::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ExecutionResult::Failure(err) => Some(err),
            ExecutionResult::Output(_) | ExecutionResult::Table(_) => None,
        }
    }
}

impl Serialize for ExecutionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ExecutionResult", 2)?;
        state.serialize_field("success", &self.is_success())?;
        match self {
            ExecutionResult::Output(output) => state.serialize_field("output", output)?,
            ExecutionResult::Table(result) => state.serialize_field("result", result)?,
            ExecutionResult::Failure(error) => state.serialize_field("error", error)?,
        }
        state.end()
    }
}

#[derive(Deserialize)]
struct ExecutionResultWire {
    success: bool,
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    result: Option<QueryResult>,
    #[serde(default)]
    error: Option<String>,
}

impl<'de> Deserialize<'de> for ExecutionResult {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = ExecutionResultWire::deserialize(deserializer)?;
        match (wire.success, wire.output, wire.result, wire.error) {
            (true, Some(output), None, None) => Ok(ExecutionResult::Output(output)),
            (true, None, Some(result), None) => Ok(ExecutionResult::Table(result)),
            (false, None, None, Some(error)) => Ok(ExecutionResult::Failure(error)),
            _ => Err(de::Error::custom(
                "execution result must carry exactly one of output, result or error",
            )),
        }
    }
}

/// A bounded sample of one live table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePreview {
    pub table_name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<JsonValue>>,
    pub row_count: usize,
}
