//! Relational database metadata capability.
//!
//! The engine never talks to a database directly; it asks a `DbMetadata`
//! implementation for column names and SQL type codes of a table, a stored
//! procedure's parameters or a query's result set.

use std::collections::HashMap;

use crate::error::{BridgeError, BridgeResult};
use crate::ident::canonical;
use crate::types::{self, SqlTypeCode};

/// Where database columns come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSource {
    Table(String),
    Procedure(String),
    Query(String),
}

impl ColumnSource {
    /// First applicable source: table, then procedure call, then query.
    pub fn resolve(table: Option<&str>, call: Option<&str>, query: Option<&str>) -> Option<Self> {
        table.map(|t| ColumnSource::Table(t.to_string()))
            .or_else(|| call.map(|c| ColumnSource::Procedure(c.to_string())))
            .or_else(|| query.map(|q| ColumnSource::Query(q.to_string())))
    }

    pub fn table_name(&self) -> Option<&str> {
        match self {
            ColumnSource::Table(t) => Some(t.as_str()),
            _ => None,
        }
    }
}

pub trait DbMetadata: Send + Sync {
    fn column_names(&self, source: &ColumnSource) -> anyhow::Result<Vec<String>>;

    fn column_types(&self, source: &ColumnSource) -> anyhow::Result<HashMap<String, SqlTypeCode>>;

    /// Catalog type for a SQL type; connectors with vendor types may refine this.
    fn to_catalog_type(&self, column: &str, code: SqlTypeCode) -> BridgeResult<String> {
        types::catalog_type(column, code).map(str::to_string)
    }

    /// Value type name recorded for export tasks.
    fn value_type_name(&self, _table: Option<&str>, _column: &str, code: SqlTypeCode) -> Option<String> {
        types::value_type_name(code).map(str::to_string)
    }
}

/// Static metadata keyed by source; used by the command line front end and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryDb {
    sources: HashMap<String, Vec<(String, SqlTypeCode)>>,
}

impl MemoryDb {
    pub fn new() -> Self { Self::default() }

    pub fn with_table(mut self, table: &str, columns: &[(&str, SqlTypeCode)]) -> Self {
        self.add(ColumnSource::Table(table.to_string()), columns.iter().map(|(n, t)| (n.to_string(), *t)).collect());
        self
    }

    pub fn add(&mut self, source: ColumnSource, columns: Vec<(String, SqlTypeCode)>) {
        self.sources.insert(source_key(&source), columns);
    }

    fn lookup(&self, source: &ColumnSource) -> anyhow::Result<&Vec<(String, SqlTypeCode)>> {
        self.sources
            .get(&source_key(source))
            .ok_or_else(|| anyhow::Error::new(BridgeError::catalog(format!("unknown database source {:?}", source))))
    }
}

fn source_key(source: &ColumnSource) -> String {
    match source {
        ColumnSource::Table(t) => format!("table:{}", canonical(t)),
        ColumnSource::Procedure(p) => format!("call:{}", canonical(p)),
        ColumnSource::Query(q) => format!("query:{}", q.trim()),
    }
}

impl DbMetadata for MemoryDb {
    fn column_names(&self, source: &ColumnSource) -> anyhow::Result<Vec<String>> {
        Ok(self.lookup(source)?.iter().map(|(n, _)| n.clone()).collect())
    }

    fn column_types(&self, source: &ColumnSource) -> anyhow::Result<HashMap<String, SqlTypeCode>> {
        Ok(self.lookup(source)?.iter().cloned().collect())
    }
}
