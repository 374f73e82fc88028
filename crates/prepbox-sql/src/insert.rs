//! Quoting and `INSERT` generation for row-backed datasets.

use itertools::Itertools;
use prepbox_common::{JsonRow, JsonValue};

/// Double-quote an identifier, doubling embedded `"`.
pub fn quote_ident(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Single-quote a string literal, doubling embedded `'`.
pub fn quote_lit(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Render a JSON cell as a SQL literal.
///
/// Null and the empty string become `NULL`; numbers and booleans are written
/// bare; nested arrays and objects are written as their JSON text.
pub fn sql_literal(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::String(s) if s.is_empty() => "NULL".to_string(),
        JsonValue::String(s) => quote_lit(s),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Bool(true) => "TRUE".to_string(),
        JsonValue::Bool(false) => "FALSE".to_string(),
        JsonValue::Array(_) | JsonValue::Object(_) => quote_lit(&value.to_string()),
    }
}

/// One `INSERT INTO "table" ("c1", ...) VALUES (...)` per row.
///
/// Cells missing from a row are written as `NULL`. Returns nothing when there
/// are no rows or no columns.
pub fn build_insert_statements(table: &str, columns: &[String], rows: &[JsonRow]) -> Vec<String> {
    if rows.is_empty() || columns.is_empty() {
        return Vec::new();
    }

    let target = quote_ident(table);
    let column_list = columns.iter().map(|c| quote_ident(c)).join(", ");

    rows.iter()
        .map(|row| {
            let values = columns
                .iter()
                .map(|column| row.get(column).map_or_else(|| "NULL".to_string(), sql_literal))
                .join(", ");
            format!("INSERT INTO {} ({}) VALUES ({})", target, column_list, values)
        })
        .collect()
}

/// Column order for generated inserts: declared columns, else CSV header,
/// else the key order of the first row.
pub fn resolve_column_order(
    declared: Option<&[String]>,
    csv_header: Option<&[String]>,
    rows: &[JsonRow],
) -> Vec<String> {
    if let Some(columns) = declared.filter(|c| !c.is_empty()) {
        return columns.to_vec();
    }
    if let Some(columns) = csv_header.filter(|c| !c.is_empty()) {
        return columns.to_vec();
    }
    rows.first()
        .map(|row| row.keys().cloned().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn row(value: JsonValue) -> JsonRow {
        match value {
            JsonValue::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("orders"), "\"orders\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_sql_literal() {
        assert_eq!(sql_literal(&json!(null)), "NULL");
        assert_eq!(sql_literal(&json!("")), "NULL");
        assert_eq!(sql_literal(&json!("O'Brien")), "'O''Brien'");
        assert_eq!(sql_literal(&json!(42)), "42");
        assert_eq!(sql_literal(&json!(-1.5)), "-1.5");
        assert_eq!(sql_literal(&json!(true)), "TRUE");
        assert_eq!(sql_literal(&json!(false)), "FALSE");
        assert_eq!(sql_literal(&json!([1, "a"])), "'[1,\"a\"]'");
        assert_eq!(sql_literal(&json!({"k": "it's"})), "'{\"k\":\"it''s\"}'");
    }

    #[test]
    fn test_build_insert_statements() {
        let rows = vec![
            row(json!({"id": 1, "name": "Ada", "active": true})),
            row(json!({"id": 2, "name": null})),
        ];
        let columns = vec!["id".to_string(), "name".to_string(), "active".to_string()];
        let statements = build_insert_statements("people", &columns, &rows);
        assert_eq!(
            statements,
            vec![
                "INSERT INTO \"people\" (\"id\", \"name\", \"active\") VALUES (1, 'Ada', TRUE)",
                "INSERT INTO \"people\" (\"id\", \"name\", \"active\") VALUES (2, NULL, NULL)",
            ]
        );
    }

    #[test]
    fn test_build_insert_statements_empty() {
        assert!(build_insert_statements("t", &["a".to_string()], &[]).is_empty());
        assert!(build_insert_statements("t", &[], &[row(json!({"a": 1}))]).is_empty());
    }

    #[test]
    fn test_resolve_column_order() {
        let rows = vec![row(json!({"z": 1, "a": 2}))];
        let declared = vec!["a".to_string()];
        let header = vec!["h".to_string()];

        assert_eq!(
            resolve_column_order(Some(&declared), Some(&header), &rows),
            vec!["a"]
        );
        assert_eq!(resolve_column_order(None, Some(&header), &rows), vec!["h"]);
        assert_eq!(resolve_column_order(None, None, &rows), vec!["z", "a"]);
        assert!(resolve_column_order(Some(&[]), None, &[]).is_empty());
    }
}
