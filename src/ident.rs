//! Identifier canonicalization and table qualification
//! ----------------------------------------------------
//! Single source of truth for how database column names and catalog identifiers
//! are compared. Every insertion and lookup site goes through `canonical`.

use std::fmt;
use tracing::warn;

pub const DEFAULT_DB: &str = "default";

/// Canonical (case-folded) form of an identifier: trimmed and lowercased.
pub fn canonical(ident: &str) -> String {
    ident.trim().to_lowercase()
}

/// Case-insensitive identifier comparison under the canonical folding.
pub fn same_ident(a: &str, b: &str) -> bool {
    canonical(a) == canonical(b)
}

/// `<database>.<table>` as understood by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    pub database: String,
    pub table: String,
}

impl QualifiedName {
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self { database: database.into(), table: table.into() }
    }

    /// Qualify a caller-supplied table with an optional database, applying the
    /// default database and lowercasing both parts.
    pub fn from_options(database: Option<&str>, table: &str) -> Self {
        let db = canonical(database.filter(|d| !d.trim().is_empty()).unwrap_or(DEFAULT_DB));
        let tbl = canonical(table);
        if tbl != table {
            warn!(target: "catbridge::configure", "Provided catalog table name {} will be mapped to {}", table, tbl);
        }
        Self { database: db, table: tbl }
    }

    /// Parse `db.table` or a bare `table` (default database).
    pub fn parse(ident: &str) -> Self {
        match ident.trim().split_once('.') {
            Some((db, tbl)) => Self::from_options(Some(db), tbl),
            None => Self::from_options(None, ident),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.table)
    }
}
