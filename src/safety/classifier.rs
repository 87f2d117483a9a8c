//! Leading-keyword classification and table-name extraction.
//!
//! Both are ordered tables of compiled patterns; the first match wins.

use regex::Regex;
use std::sync::LazyLock;

use super::StatementKind;

/// `(pattern, kind)` pairs tested in `StatementKind::RECOGNISED` order.
static KIND_PREFIXES: LazyLock<Vec<(Regex, StatementKind)>> = LazyLock::new(|| {
    StatementKind::RECOGNISED
        .iter()
        .filter_map(|kind| kind.keyword().map(|keyword| (keyword, *kind)))
        .map(|(keyword, kind)| {
            let pattern = Regex::new(&format!(r"(?i)^{keyword}\s")).expect("valid pattern");
            (pattern, kind)
        })
        .collect()
});

/// Identifier characters, including `schema.table` dots and quoting delimiters.
const IDENT: &str = r#"([\w\[\]"`.]+)"#;

/// `(kind, pattern)` pairs for table extraction. Kinds absent here yield `None`.
static TABLE_PATTERNS: LazyLock<Vec<(StatementKind, Regex)>> = LazyLock::new(|| {
    [
        (StatementKind::Select, format!(r"(?i)\bFROM\s+{IDENT}")),
        (StatementKind::Insert, format!(r"(?i)^INSERT\s+INTO\s+{IDENT}")),
        (StatementKind::Update, format!(r"(?i)^UPDATE\s+{IDENT}")),
        (StatementKind::Delete, format!(r"(?i)\bFROM\s+{IDENT}")),
    ]
    .into_iter()
    .map(|(kind, pattern)| (kind, Regex::new(&pattern).expect("valid pattern")))
    .collect()
});

/// Classifies query text by its first keyword.
///
/// Absent, empty or whitespace-only input is `Unknown`. Matching is
/// case-insensitive and requires whitespace after the keyword.
pub fn classify<'a>(sql: impl Into<Option<&'a str>>) -> StatementKind {
    let Some(sql) = sql.into() else {
        return StatementKind::Unknown;
    };
    let trimmed = sql.trim_start();
    if trimmed.is_empty() {
        return StatementKind::Unknown;
    }

    KIND_PREFIXES
        .iter()
        .find(|(pattern, _)| pattern.is_match(trimmed))
        .map(|(_, kind)| *kind)
        .unwrap_or(StatementKind::Unknown)
}

/// Best-effort extraction of the table a statement targets.
///
/// Only attempted for SELECT, INSERT, UPDATE and DELETE. Subqueries, CTEs and
/// quoted identifiers containing delimiters can fool it; the result must not
/// be treated as authoritative.
pub fn extract_table_name(sql: &str) -> Option<String> {
    let kind = classify(sql);
    let trimmed = sql.trim_start();

    let (_, pattern) = TABLE_PATTERNS.iter().find(|(k, _)| *k == kind)?;
    let raw = pattern.captures(trimmed)?.get(1)?.as_str();
    let name: String = raw
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | '"' | '`'))
        .collect();

    let name = name.trim_matches('.');
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
