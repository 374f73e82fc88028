//! Conversions between Arrow record batches and JSON cells.

use std::sync::Arc;

use datafusion::arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, RecordBatch, StringArray,
};
use datafusion::arrow::datatypes::{
    DataType as ArrowDataType, Field as ArrowField, Float32Type, Float64Type, Int8Type, Int16Type,
    Int32Type, Int64Type, Schema as ArrowSchema, UInt8Type, UInt16Type, UInt32Type, UInt64Type,
};
use datafusion::arrow::util::display::{ArrayFormatter, FormatOptions};
use prepbox_common::error::{Error, Result};
use prepbox_common::{JsonRow, JsonValue};

/// Row-major JSON cells for a set of batches.
pub fn batches_to_rows(batches: &[RecordBatch]) -> Result<Vec<Vec<JsonValue>>> {
    let mut rows = Vec::with_capacity(batches.iter().map(|b| b.num_rows()).sum());
    for batch in batches {
        let columns = batch
            .columns()
            .iter()
            .map(column_to_json)
            .collect::<Result<Vec<_>>>()?;
        for row in 0..batch.num_rows() {
            rows.push(columns.iter().map(|col| col[row].clone()).collect());
        }
    }
    Ok(rows)
}

/// Integers, floats, booleans and strings map to native JSON; nulls to
/// `null`; any other type to its Arrow display string.
#[allow(clippy::wildcard_enum_match_arm)]
pub fn column_to_json(array: &ArrayRef) -> Result<Vec<JsonValue>> {
    let len = array.len();
    let values: Vec<JsonValue> = match array.data_type() {
        ArrowDataType::Null => vec![JsonValue::Null; len],
        ArrowDataType::Boolean => {
            let arr = array.as_boolean();
            collect_cells(array, |i| JsonValue::Bool(arr.value(i)))
        }
        ArrowDataType::Int8 => {
            let arr = array.as_primitive::<Int8Type>();
            collect_cells(array, |i| JsonValue::from(arr.value(i)))
        }
        ArrowDataType::Int16 => {
            let arr = array.as_primitive::<Int16Type>();
            collect_cells(array, |i| JsonValue::from(arr.value(i)))
        }
        ArrowDataType::Int32 => {
            let arr = array.as_primitive::<Int32Type>();
            collect_cells(array, |i| JsonValue::from(arr.value(i)))
        }
        ArrowDataType::Int64 => {
            let arr = array.as_primitive::<Int64Type>();
            collect_cells(array, |i| JsonValue::from(arr.value(i)))
        }
        ArrowDataType::UInt8 => {
            let arr = array.as_primitive::<UInt8Type>();
            collect_cells(array, |i| JsonValue::from(arr.value(i)))
        }
        ArrowDataType::UInt16 => {
            let arr = array.as_primitive::<UInt16Type>();
            collect_cells(array, |i| JsonValue::from(arr.value(i)))
        }
        ArrowDataType::UInt32 => {
            let arr = array.as_primitive::<UInt32Type>();
            collect_cells(array, |i| JsonValue::from(arr.value(i)))
        }
        ArrowDataType::UInt64 => {
            let arr = array.as_primitive::<UInt64Type>();
            collect_cells(array, |i| JsonValue::from(arr.value(i)))
        }
        ArrowDataType::Float32 => {
            let arr = array.as_primitive::<Float32Type>();
            collect_cells(array, |i| float_to_json(f64::from(arr.value(i))))
        }
        ArrowDataType::Float64 => {
            let arr = array.as_primitive::<Float64Type>();
            collect_cells(array, |i| float_to_json(arr.value(i)))
        }
        ArrowDataType::Utf8 => {
            let arr = array.as_string::<i32>();
            collect_cells(array, |i| JsonValue::String(arr.value(i).to_string()))
        }
        ArrowDataType::LargeUtf8 => {
            let arr = array.as_string::<i64>();
            collect_cells(array, |i| JsonValue::String(arr.value(i).to_string()))
        }
        ArrowDataType::Utf8View => {
            let arr = array.as_string_view();
            collect_cells(array, |i| JsonValue::String(arr.value(i).to_string()))
        }
        _ => {
            let options = FormatOptions::default();
            let formatter = ArrayFormatter::try_new(array.as_ref(), &options)
                .map_err(|e| Error::internal(e.to_string()))?;
            collect_cells(array, |i| JsonValue::String(formatter.value(i).to_string()))
        }
    };
    Ok(values)
}

fn collect_cells(array: &ArrayRef, cell: impl Fn(usize) -> JsonValue) -> Vec<JsonValue> {
    (0..array.len())
        .map(|i| {
            if array.is_null(i) {
                JsonValue::Null
            } else {
                cell(i)
            }
        })
        .collect()
}

fn float_to_json(value: f64) -> JsonValue {
    serde_json::Number::from_f64(value)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(value.to_string()))
}

/// Column type picked for bulk-loaded JSON rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferredType {
    Int64,
    Float64,
    Boolean,
    Utf8,
}

impl InferredType {
    fn arrow_type(self) -> ArrowDataType {
        match self {
            InferredType::Int64 => ArrowDataType::Int64,
            InferredType::Float64 => ArrowDataType::Float64,
            InferredType::Boolean => ArrowDataType::Boolean,
            InferredType::Utf8 => ArrowDataType::Utf8,
        }
    }

    fn merge(self, other: InferredType) -> InferredType {
        match (self, other) {
            (a, b) if a == b => a,
            (InferredType::Int64, InferredType::Float64)
            | (InferredType::Float64, InferredType::Int64) => InferredType::Float64,
            _ => InferredType::Utf8,
        }
    }
}

/// Infer the narrowest type that holds every non-null cell of a column.
///
/// Numeric and boolean text (as produced by the CSV reader) counts as numeric
/// or boolean. An all-null column is text.
pub fn infer_column_type<'a>(cells: impl Iterator<Item = Option<&'a JsonValue>>) -> InferredType {
    cells
        .filter_map(|cell| cell.and_then(cell_type))
        .reduce(InferredType::merge)
        .unwrap_or(InferredType::Utf8)
}

fn cell_type(value: &JsonValue) -> Option<InferredType> {
    match value {
        JsonValue::Null => None,
        JsonValue::Bool(_) => Some(InferredType::Boolean),
        JsonValue::Number(n) if n.is_i64() => Some(InferredType::Int64),
        JsonValue::Number(_) => Some(InferredType::Float64),
        JsonValue::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else if s.parse::<i64>().is_ok() {
                Some(InferredType::Int64)
            } else if s.parse::<f64>().is_ok_and(f64::is_finite) {
                Some(InferredType::Float64)
            } else if parse_bool(s).is_some() {
                Some(InferredType::Boolean)
            } else {
                Some(InferredType::Utf8)
            }
        }
        JsonValue::Array(_) | JsonValue::Object(_) => Some(InferredType::Utf8),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn cell_as_i64(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        JsonValue::Null | JsonValue::Bool(_) | JsonValue::Array(_) | JsonValue::Object(_) => None,
    }
}

fn cell_as_f64(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        JsonValue::Null | JsonValue::Bool(_) | JsonValue::Array(_) | JsonValue::Object(_) => None,
    }
}

fn cell_as_bool(value: &JsonValue) -> Option<bool> {
    match value {
        JsonValue::Bool(b) => Some(*b),
        JsonValue::String(s) => parse_bool(s.trim()),
        JsonValue::Null | JsonValue::Number(_) | JsonValue::Array(_) | JsonValue::Object(_) => None,
    }
}

fn cell_as_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) if s.is_empty() => None,
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(_) | JsonValue::Bool(_) | JsonValue::Array(_) | JsonValue::Object(_) => {
            Some(value.to_string())
        }
    }
}

/// Build a single record batch from row objects, one column per entry of
/// `columns`. Missing cells are null.
pub fn rows_to_batch(columns: &[String], rows: &[JsonRow]) -> Result<RecordBatch> {
    if columns.is_empty() {
        return Err(Error::internal("cannot materialize a table with no columns"));
    }

    let mut fields = Vec::with_capacity(columns.len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(columns.len());

    for column in columns {
        let cells = || rows.iter().map(|row| row.get(column));
        let inferred = infer_column_type(cells());
        let array: ArrayRef = match inferred {
            InferredType::Int64 => Arc::new(Int64Array::from(
                cells().map(|c| c.and_then(cell_as_i64)).collect::<Vec<_>>(),
            )),
            InferredType::Float64 => Arc::new(Float64Array::from(
                cells().map(|c| c.and_then(cell_as_f64)).collect::<Vec<_>>(),
            )),
            InferredType::Boolean => Arc::new(BooleanArray::from(
                cells().map(|c| c.and_then(cell_as_bool)).collect::<Vec<_>>(),
            )),
            InferredType::Utf8 => Arc::new(StringArray::from(
                cells().map(|c| c.and_then(cell_as_text)).collect::<Vec<_>>(),
            )),
        };
        fields.push(ArrowField::new(column, inferred.arrow_type(), true));
        arrays.push(array);
    }

    let schema = Arc::new(ArrowSchema::new(fields));
    RecordBatch::try_new(schema, arrays).map_err(|e| Error::internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use datafusion::arrow::array::{Date32Array, Float32Array, Int32Array};
    use serde_json::json;

    use super::*;

    fn row(value: JsonValue) -> JsonRow {
        match value {
            JsonValue::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_column_to_json_native_types() {
        let ints: ArrayRef = Arc::new(Int32Array::from(vec![Some(1), None, Some(3)]));
        assert_eq!(
            column_to_json(&ints).unwrap(),
            vec![json!(1), json!(null), json!(3)]
        );

        let floats: ArrayRef = Arc::new(Float32Array::from(vec![1.5]));
        assert_eq!(column_to_json(&floats).unwrap(), vec![json!(1.5)]);

        let nan: ArrayRef = Arc::new(Float64Array::from(vec![f64::NAN]));
        assert_eq!(column_to_json(&nan).unwrap(), vec![json!("NaN")]);

        let strings: ArrayRef = Arc::new(StringArray::from(vec![Some("a"), None]));
        assert_eq!(
            column_to_json(&strings).unwrap(),
            vec![json!("a"), json!(null)]
        );
    }

    #[test]
    fn test_column_to_json_display_fallback() {
        let dates: ArrayRef = Arc::new(Date32Array::from(vec![Some(0), None]));
        assert_eq!(
            column_to_json(&dates).unwrap(),
            vec![json!("1970-01-01"), json!(null)]
        );
    }

    #[test]
    fn test_batches_to_rows() {
        let batch = rows_to_batch(
            &["id".to_string(), "name".to_string()],
            &[row(json!({"id": 1, "name": "Ada"})), row(json!({"id": 2}))],
        )
        .unwrap();
        let rows = batches_to_rows(&[batch.clone(), batch]).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], vec![json!(1), json!("Ada")]);
        assert_eq!(rows[1], vec![json!(2), json!(null)]);
    }

    #[test]
    fn test_infer_column_type() {
        let infer = |values: Vec<JsonValue>| infer_column_type(values.iter().map(Some));

        assert_eq!(infer(vec![json!(1), json!("2")]), InferredType::Int64);
        assert_eq!(infer(vec![json!(1), json!(2.5)]), InferredType::Float64);
        assert_eq!(infer(vec![json!("1.5"), json!("")]), InferredType::Float64);
        assert_eq!(infer(vec![json!(true), json!("FALSE")]), InferredType::Boolean);
        assert_eq!(infer(vec![json!(true), json!(1)]), InferredType::Utf8);
        assert_eq!(infer(vec![json!("x"), json!(1)]), InferredType::Utf8);
        assert_eq!(infer(vec![json!(null)]), InferredType::Utf8);
        assert_eq!(infer(vec![]), InferredType::Utf8);
    }

    #[test]
    fn test_rows_to_batch_types() {
        let batch = rows_to_batch(
            &[
                "id".to_string(),
                "score".to_string(),
                "active".to_string(),
                "note".to_string(),
            ],
            &[
                row(json!({"id": "1", "score": "9.5", "active": "true", "note": ""})),
                row(json!({"id": "2", "score": "7", "active": "false", "note": {"k": 1}})),
            ],
        )
        .unwrap();

        let schema = batch.schema();
        assert_eq!(schema.field(0).data_type(), &ArrowDataType::Int64);
        assert_eq!(schema.field(1).data_type(), &ArrowDataType::Float64);
        assert_eq!(schema.field(2).data_type(), &ArrowDataType::Boolean);
        assert_eq!(schema.field(3).data_type(), &ArrowDataType::Utf8);
        assert_eq!(batch.num_rows(), 2);

        let rows = batches_to_rows(&[batch]).unwrap();
        assert_eq!(rows[0], vec![json!(1), json!(9.5), json!(true), json!(null)]);
        assert_eq!(rows[1][3], json!("{\"k\":1}"));
    }

    #[test]
    fn test_rows_to_batch_requires_columns() {
        assert!(rows_to_batch(&[], &[row(json!({"a": 1}))]).is_err());
    }
}
