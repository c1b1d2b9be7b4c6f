//! Statement-kind classification for query counting.

/// The kind of SQL statement, detected from its leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// SELECT query
    Select,
    /// INSERT statement
    Insert,
    /// UPDATE statement
    Update,
    /// DELETE statement
    Delete,
    /// Anything else (DDL, empty input, unrecognized leading token)
    Other,
}

impl StatementKind {
    /// Detect the statement kind from a SQL string.
    ///
    /// Matching is case-insensitive and ignores leading whitespace, line and
    /// block comments, and parentheses. Input that starts with anything other
    /// than the four DML keywords — including an empty string — classifies as
    /// [`StatementKind::Other`]; classification never fails.
    pub fn from_sql(sql: &str) -> Self {
        let trimmed = strip_sql_prefix(sql);
        if starts_with_keyword(trimmed, "SELECT") {
            StatementKind::Select
        } else if starts_with_keyword(trimmed, "INSERT") {
            StatementKind::Insert
        } else if starts_with_keyword(trimmed, "UPDATE") {
            StatementKind::Update
        } else if starts_with_keyword(trimmed, "DELETE") {
            StatementKind::Delete
        } else {
            StatementKind::Other
        }
    }

    /// Lowercase name, used in log lines and reports.
    pub fn as_str(self) -> &'static str {
        match self {
            StatementKind::Select => "select",
            StatementKind::Insert => "insert",
            StatementKind::Update => "update",
            StatementKind::Delete => "delete",
            StatementKind::Other => "other",
        }
    }
}

/// Strip leading whitespace, SQL comments (`--` and `/* */`), and parentheses
/// from a SQL string to find the first meaningful keyword.
pub(crate) fn strip_sql_prefix(sql: &str) -> &str {
    let mut s = sql;
    loop {
        let before = s;
        // Trim whitespace
        s = s.trim_start();
        // Skip line comments
        if s.starts_with("--") {
            if let Some(pos) = s.find('\n') {
                s = &s[pos + 1..];
                continue;
            }
            return ""; // comment is the whole remaining string
        }
        // Skip block comments
        if s.starts_with("/*") {
            if let Some(pos) = s.find("*/") {
                s = &s[pos + 2..];
                continue;
            }
            return ""; // unclosed block comment
        }
        // Skip leading parentheses
        if s.starts_with('(') {
            s = &s[1..];
            continue;
        }
        if s == before {
            break;
        }
    }
    s
}

pub(crate) fn starts_with_keyword(s: &str, keyword: &str) -> bool {
    match s.get(0..keyword.len()) {
        Some(prefix) => prefix.eq_ignore_ascii_case(keyword),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_leading_keyword() {
        assert_eq!(
            StatementKind::from_sql("SELECT * FROM users"),
            StatementKind::Select
        );
        assert_eq!(
            StatementKind::from_sql("  select * FROM users"),
            StatementKind::Select
        );
        assert_eq!(
            StatementKind::from_sql("INSERT INTO users (name) VALUES ($1)"),
            StatementKind::Insert
        );
        assert_eq!(
            StatementKind::from_sql("update users SET name = $1"),
            StatementKind::Update
        );
        assert_eq!(
            StatementKind::from_sql("DELETE FROM users WHERE id = $1"),
            StatementKind::Delete
        );
        assert_eq!(
            StatementKind::from_sql("CREATE TABLE users (id INT)"),
            StatementKind::Other
        );
    }

    #[test]
    fn empty_and_unknown_are_other() {
        assert_eq!(StatementKind::from_sql(""), StatementKind::Other);
        assert_eq!(StatementKind::from_sql("   "), StatementKind::Other);
        assert_eq!(StatementKind::from_sql("EXPLAIN SELECT 1"), StatementKind::Other);
        assert_eq!(
            StatementKind::from_sql("WITH cte AS (SELECT 1) SELECT * FROM cte"),
            StatementKind::Other
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            StatementKind::from_sql("-- leading comment\nSELECT 1"),
            StatementKind::Select
        );
        assert_eq!(
            StatementKind::from_sql("/* hint */ UPDATE t SET x = 1"),
            StatementKind::Update
        );
        assert_eq!(StatementKind::from_sql("-- only a comment"), StatementKind::Other);
        assert_eq!(StatementKind::from_sql("/* unclosed"), StatementKind::Other);
    }

    #[test]
    fn parens_are_skipped() {
        assert_eq!(
            StatementKind::from_sql("(SELECT 1) UNION (SELECT 2)"),
            StatementKind::Select
        );
    }
}
