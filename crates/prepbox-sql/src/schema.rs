//! Best-effort recovery of table names from SQL text.
//!
//! Regex based, so it sees `CREATE TABLE` inside comments and string literals
//! as well. Callers strip comments first when that matters.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref CREATE_TABLE_NAME_RE: Regex = Regex::new(
        r#"(?i)CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?["'`]?([A-Za-z0-9_]+)["'`]?"#
    )
    .expect("CREATE_TABLE_NAME_RE pattern is valid");
    static ref CREATE_TABLE_REF_RE: Regex = Regex::new(
        r#"(?i)CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?[`"']?([^`"'\s;(]+)[`"']?"#
    )
    .expect("CREATE_TABLE_REF_RE pattern is valid");
    static ref INSERT_INTO_RE: Regex =
        Regex::new(r"(?i)INSERT\s+INTO").expect("INSERT_INTO_RE pattern is valid");
    static ref SQL_SHAPE_RE: Regex = Regex::new(
        r"(?i)\b(create\s+table|insert\s+into|with\s+|alter\s+table|drop\s+table)\b"
    )
    .expect("SQL_SHAPE_RE pattern is valid");
}

/// Lower-cased names of every table a fragment creates, in order of appearance.
pub fn extract_table_names(sql: &str) -> Vec<String> {
    CREATE_TABLE_NAME_RE
        .captures_iter(sql)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Table references of a single `CREATE TABLE` statement as written, case kept.
///
/// Accepts any run of characters up to a quote, whitespace, `;` or `(`, so
/// qualified names such as `main.orders` come back whole.
pub fn created_table_refs(statement: &str) -> Vec<String> {
    CREATE_TABLE_REF_RE
        .captures_iter(statement)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

pub fn is_create_table(statement: &str) -> bool {
    CREATE_TABLE_REF_RE.is_match(statement)
}

pub fn contains_insert(sql: &str) -> bool {
    INSERT_INTO_RE.is_match(sql)
}

/// Whether free text plausibly holds SQL rather than CSV or prose.
pub fn looks_like_sql(sql: &str) -> bool {
    !sql.is_empty() && SQL_SHAPE_RE.is_match(sql)
}
