//! Heuristic injection red flags.
//!
//! A defense-in-depth signal only. Executors must still bind parameters.

use regex::Regex;
use std::sync::LazyLock;

static SUSPICIOUS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Boolean tautology: OR 1=1, AND 2 = 2
        r"(?i)\b(?:OR|AND)\s*\d+\s*=\s*\d+",
        r"(?i)UNION\s+SELECT",
        r"(?i)\bDROP\s+TABLE\b",
        // Stacked statement followed by a comment
        r"(?s);.*--",
        // Extended stored procedures, matched anywhere in an identifier
        r"(?i)xp_\w+",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("valid pattern"))
    .collect()
});

/// Returns true if the text matches any known injection pattern.
///
/// Empty and whitespace-only input is never suspicious.
pub fn has_suspicious_pattern(sql: &str) -> bool {
    if sql.trim().is_empty() {
        return false;
    }
    SUSPICIOUS_PATTERNS.iter().any(|pattern| pattern.is_match(sql))
}
