//! Query safety analysis.
//!
//! Classifies raw query text by its leading keyword, extracts a best-effort
//! table name, and flags textual patterns typical of injection attempts.
//! None of this is a SQL parser: results feed coarse policy decisions only.

mod classifier;
mod risk;

pub use classifier::{classify, extract_table_name};
pub use risk::has_suspicious_pattern;

use serde::{Deserialize, Serialize};
use std::fmt;

/// The coarse category of a query, derived from its first keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    /// No recognised leading keyword, or empty input.
    #[default]
    Unknown,
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Drop,
    Alter,
    Truncate,
    Merge,
    Execute,
}

impl StatementKind {
    /// Recognised kinds in classification priority order.
    pub const RECOGNISED: [StatementKind; 10] = [
        Self::Select,
        Self::Insert,
        Self::Update,
        Self::Delete,
        Self::Create,
        Self::Drop,
        Self::Alter,
        Self::Truncate,
        Self::Merge,
        Self::Execute,
    ];

    /// Returns the leading keyword for this kind, or `None` for `Unknown`.
    pub fn keyword(&self) -> Option<&'static str> {
        match self {
            Self::Unknown => None,
            Self::Select => Some("SELECT"),
            Self::Insert => Some("INSERT"),
            Self::Update => Some("UPDATE"),
            Self::Delete => Some("DELETE"),
            Self::Create => Some("CREATE"),
            Self::Drop => Some("DROP"),
            Self::Alter => Some("ALTER"),
            Self::Truncate => Some("TRUNCATE"),
            Self::Merge => Some("MERGE"),
            Self::Execute => Some("EXECUTE"),
        }
    }

    /// Returns true for statements that only read data.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::Select)
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keyword().unwrap_or("UNKNOWN"))
    }
}
