//! Text clean-up applied to SQL before it reaches the engine.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref FENCE_OPEN_RE: Regex =
        Regex::new(r"```[\w+-]*\s*").expect("FENCE_OPEN_RE pattern is valid");
    static ref FENCE_CLOSE_RE: Regex = Regex::new(r"\s*```").expect("FENCE_CLOSE_RE pattern is valid");
    static ref LINE_COMMENT_RE: Regex = Regex::new(r"(?m)--.*$").expect("LINE_COMMENT_RE pattern is valid");
    static ref BLOCK_COMMENT_RE: Regex =
        Regex::new(r"(?s)/\*.*?\*/").expect("BLOCK_COMMENT_RE pattern is valid");
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").expect("WHITESPACE_RE pattern is valid");
}

/// Remove markdown code fences (```` ```sql ```` and ```` ``` ````) and trim.
pub fn strip_code_fences(text: &str) -> String {
    let opened = FENCE_OPEN_RE.replace_all(text, "");
    FENCE_CLOSE_RE.replace_all(&opened, "").trim().to_string()
}

/// Remove `--` line comments and `/* */` block comments.
///
/// Comment markers inside string literals are removed too.
pub fn strip_comments(sql: &str) -> String {
    let without_lines = LINE_COMMENT_RE.replace_all(sql, "");
    BLOCK_COMMENT_RE.replace_all(&without_lines, "").into_owned()
}

pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text, " ").trim().to_string()
}

/// Canonical form of a script for signature purposes.
pub fn normalize_for_signature(sql: &str) -> String {
    let collapsed = WHITESPACE_RE.replace_all(sql.trim(), " ");
    collapsed
        .strip_suffix(';')
        .unwrap_or(&collapsed)
        .to_string()
}

/// Keep at most `limit` characters.
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Fences and comments removed, ready for [`split_statements`](crate::split_statements).
pub fn sanitize_script(text: &str) -> String {
    strip_comments(&strip_code_fences(text))
}
