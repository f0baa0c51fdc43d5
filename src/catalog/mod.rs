//! Catalog table store surface.
//!
//! The catalog is a remote service; the engine needs only three calls from it:
//! the full table schema (data fields followed by partition fields), the data
//! schema view (data fields only, optionally narrowed by a partition filter),
//! and publishing the schema a job writes with.

use std::collections::BTreeMap;

use crate::error::BridgeResult;
use crate::ident::QualifiedName;

mod schema;
mod memory;
mod cli;

pub use schema::{FieldSchema, FieldType, PrimitiveType, TableSchema};
pub use memory::InMemoryCatalog;
pub use cli::CatalogCli;

/// Partition key -> value selecting a static partition.
pub type PartitionFilter = BTreeMap<String, String>;

pub trait CatalogService: Send + Sync {
    fn full_table_schema(&self, table: &QualifiedName) -> BridgeResult<TableSchema>;

    fn data_schema(&self, table: &QualifiedName, filter: Option<&PartitionFilter>) -> BridgeResult<TableSchema>;

    fn set_schema(&self, table: &QualifiedName, schema: &TableSchema) -> BridgeResult<()>;
}
