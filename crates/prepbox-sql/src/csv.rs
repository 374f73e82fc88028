//! Lenient CSV reader for instructor-pasted dataset text.
//!
//! Every cell comes back as a JSON string; type inference is left to whoever
//! materializes the rows.

use itertools::Itertools;
use prepbox_common::{JsonRow, JsonValue};

/// Header and rows of a parsed CSV document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsvTable {
    pub columns: Vec<String>,
    pub rows: Vec<JsonRow>,
}

impl CsvTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Parse CSV text into row objects keyed by header.
///
/// Blank lines and comment lines (`//`, `--`, `#`) are skipped. Empty header
/// cells are named `column_<n>`. A header with no data lines yields an empty
/// table rather than an error.
pub fn parse_csv(text: &str) -> CsvTable {
    let mut lines = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).trim())
        .filter(|line| !line.is_empty() && !is_comment_line(line));

    let Some(header_line) = lines.next() else {
        return CsvTable::default();
    };

    let headers: Vec<String> = parse_csv_line(header_line)
        .into_iter()
        .enumerate()
        .map(|(idx, cell)| {
            if cell.is_empty() {
                format!("column_{}", idx + 1)
            } else {
                cell
            }
        })
        .collect();

    let rows: Vec<JsonRow> = lines
        .map(|line| {
            let mut cells = parse_csv_line(line).into_iter();
            headers
                .iter()
                .map(|header| {
                    let cell = cells.next().unwrap_or_default();
                    (header.clone(), JsonValue::String(cell))
                })
                .collect()
        })
        .collect();

    if rows.is_empty() {
        return CsvTable::default();
    }

    CsvTable {
        columns: headers.into_iter().unique().collect(),
        rows,
    }
}

/// Split one CSV line on unquoted commas; `""` inside quotes is a literal quote.
pub fn parse_csv_line(line: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                values.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    values.push(current.trim().to_string());
    values
}

/// Number of non-blank lines, used as a cheap size fingerprint.
pub fn line_count(text: &str) -> usize {
    text.lines().filter(|line| !line.trim().is_empty()).count()
}

fn is_comment_line(line: &str) -> bool {
    line.starts_with("//") || line.starts_with("--") || line.starts_with('#')
}
