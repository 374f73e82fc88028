//! Statement splitting for instructor-authored SQL scripts.
//!
//! This is a heuristic scanner, not a SQL parser: it never rejects input and
//! never validates what it returns. Besides unquoted `;`, a `CREATE TABLE`
//! keyword pair at the start of a word also opens a new statement, since
//! hand-written seed scripts regularly omit the terminating semicolon between
//! table definitions.

const CREATE_TABLE: &[u8] = b"CREATE TABLE";

/// Split a SQL script into trimmed, non-empty statements.
///
/// ```
/// use prepbox_sql::split_statements;
///
/// let statements = split_statements("CREATE TABLE a (x INT) CREATE TABLE b (y INT); SELECT 1");
/// assert_eq!(statements, vec!["CREATE TABLE a (x INT)", "CREATE TABLE b (y INT)", "SELECT 1"]);
/// ```
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut in_backtick = false;

    let mut prev: Option<char> = None;

    for (i, ch) in sql.char_indices() {
        let escaped = prev == Some('\\');

        match ch {
            '\'' if !escaped && !in_double_quote && !in_backtick => {
                in_single_quote = !in_single_quote;
            }
            '"' if !escaped && !in_single_quote && !in_backtick => {
                in_double_quote = !in_double_quote;
            }
            '`' if !escaped && !in_single_quote && !in_double_quote => {
                in_backtick = !in_backtick;
            }
            _ => {}
        }

        let quoted = in_single_quote || in_double_quote || in_backtick;

        let starts_statement = !quoted
            && (ch == 'c' || ch == 'C')
            && is_word_start(prev)
            && starts_with_create_table(&sql[i..])
            && !current.trim().is_empty();

        if starts_statement {
            push_statement(&mut statements, &current);
            current.clear();
            current.push(ch);
        } else if ch == ';' && !quoted {
            push_statement(&mut statements, &current);
            current.clear();
        } else {
            current.push(ch);
        }

        prev = Some(ch);
    }

    push_statement(&mut statements, &current);
    statements
}

fn is_word_start(prev: Option<char>) -> bool {
    match prev {
        None => true,
        Some(c) => c.is_whitespace() || c == ';',
    }
}

fn starts_with_create_table(rest: &str) -> bool {
    rest.as_bytes()
        .get(..CREATE_TABLE.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(CREATE_TABLE))
}

fn push_statement(statements: &mut Vec<String>, current: &str) {
    let stmt = current.trim();
    if !stmt.is_empty() {
        statements.push(stmt.to_string());
    }
}
