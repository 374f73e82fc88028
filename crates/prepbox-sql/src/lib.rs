//! Heuristic SQL handling for prepbox.
//!
//! Nothing here parses SQL. The splitter, the table extractor and the script
//! sanitizer are lexical best-effort helpers tuned for instructor seed scripts;
//! the engine remains the only authority on whether a statement is valid.

pub mod csv;
pub mod insert;
pub mod schema;
pub mod script;
pub mod signature;
pub mod splitter;

pub use csv::{CsvTable, parse_csv, parse_csv_line};
pub use insert::{build_insert_statements, quote_ident, quote_lit, resolve_column_order, sql_literal};
pub use schema::{contains_insert, created_table_refs, extract_table_names, is_create_table, looks_like_sql};
pub use script::{collapse_whitespace, normalize_for_signature, sanitize_script, strip_code_fences};
pub use signature::{LoadSignature, SignatureBuilder, build_signature};
pub use splitter::split_statements;
