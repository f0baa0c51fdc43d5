use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::{CatalogService, FieldSchema, PartitionFilter, TableSchema};
use crate::ddl::{parse_create_table, CreateTableStmt};
use crate::error::{BridgeError, BridgeResult};
use crate::ident::QualifiedName;

#[derive(Debug, Clone)]
struct TableEntry {
    data: Vec<FieldSchema>,
    partitions: Vec<FieldSchema>,
    published: Option<TableSchema>,
}

/// Catalog held in memory. Backs the command line front end and tests.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    tables: RwLock<HashMap<QualifiedName, TableEntry>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self { Self::default() }

    pub fn create_table(&self, name: &QualifiedName, data: Vec<FieldSchema>, partitions: Vec<FieldSchema>) -> BridgeResult<()> {
        let mut tables = self.tables.write();
        if tables.contains_key(name) {
            return Err(BridgeError::catalog(format!("table {} already exists", name)));
        }
        let full: TableSchema = data.iter().chain(partitions.iter()).cloned().collect();
        full.ensure_unique_names(&name.to_string())?;
        info!(target: "catbridge::catalog", "created table {} data={:?} partitions={:?}", name, data.len(), partitions.len());
        tables.insert(name.clone(), TableEntry { data, partitions, published: None });
        Ok(())
    }

    /// Apply a script of `;`-separated CREATE TABLE statements. Returns the number applied.
    pub fn execute_ddl(&self, script: &str) -> BridgeResult<usize> {
        let mut applied = 0usize;
        for stmt in script.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let CreateTableStmt { name, if_not_exists, columns, partitions, storage } = parse_create_table(stmt)?;
            if if_not_exists && self.contains(&name) {
                debug!(target: "catbridge::catalog", "table {} exists; skipping", name);
                continue;
            }
            debug!(target: "catbridge::catalog", "create {} storage={:?}", name, storage);
            self.create_table(&name, columns, partitions)?;
            applied += 1;
        }
        Ok(applied)
    }

    pub fn contains(&self, name: &QualifiedName) -> bool {
        self.tables.read().contains_key(name)
    }

    /// Schema last published through `set_schema`.
    pub fn published_schema(&self, name: &QualifiedName) -> Option<TableSchema> {
        self.tables.read().get(name).and_then(|t| t.published.clone())
    }
}

impl CatalogService for InMemoryCatalog {
    fn full_table_schema(&self, table: &QualifiedName) -> BridgeResult<TableSchema> {
        let tables = self.tables.read();
        let entry = tables.get(table).ok_or_else(|| BridgeError::TableNotFound { table: table.to_string() })?;
        Ok(entry.data.iter().chain(entry.partitions.iter()).cloned().collect())
    }

    fn data_schema(&self, table: &QualifiedName, filter: Option<&PartitionFilter>) -> BridgeResult<TableSchema> {
        let tables = self.tables.read();
        let entry = tables.get(table).ok_or_else(|| BridgeError::TableNotFound { table: table.to_string() })?;
        if let Some(filter) = filter {
            for key in filter.keys() {
                if !entry.partitions.iter().any(|p| p.name == *key) {
                    return Err(BridgeError::catalog(format!("partition filter key {} is not a partition column of {}", key, table)));
                }
            }
        }
        Ok(TableSchema::new(entry.data.clone()))
    }

    fn set_schema(&self, table: &QualifiedName, schema: &TableSchema) -> BridgeResult<()> {
        let mut tables = self.tables.write();
        let entry = tables.get_mut(table).ok_or_else(|| BridgeError::TableNotFound { table: table.to_string() })?;
        entry.published = Some(schema.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PrimitiveType;
    use crate::partition::filter_map;

    fn name() -> QualifiedName { QualifiedName::new("db", "t") }

    #[test]
    fn full_and_data_schema() {
        let c = InMemoryCatalog::new();
        c.execute_ddl("create table db.t (\n\ta string,\n\tb int)\npartitioned by (\n\tp string)\nstored as rcfile").unwrap();
        assert_eq!(c.full_table_schema(&name()).unwrap().field_names(), vec!["a", "b", "p"]);
        assert_eq!(c.data_schema(&name(), None).unwrap().field_names(), vec!["a", "b"]);
        assert!(c.data_schema(&name(), Some(&filter_map("p", "x"))).is_ok());
        assert!(c.data_schema(&name(), Some(&filter_map("a", "x"))).is_err());
    }

    #[test]
    fn missing_table_and_duplicates() {
        let c = InMemoryCatalog::new();
        assert_eq!(c.full_table_schema(&name()).unwrap_err().code_str(), "table_not_found");
        c.create_table(&name(), vec![FieldSchema::primitive("a", PrimitiveType::Int)], vec![]).unwrap();
        assert!(c.create_table(&name(), vec![], vec![]).is_err());
        assert_eq!(c.execute_ddl("create table if not exists db.t (a int)").unwrap(), 0);
        let dup = c.execute_ddl("create table db.u (a int, A string)").unwrap_err();
        assert_eq!(dup.code_str(), "duplicate_catalog_field");
    }

    #[test]
    fn publish_schema() {
        let c = InMemoryCatalog::new();
        c.create_table(&name(), vec![FieldSchema::primitive("a", PrimitiveType::Int)], vec![]).unwrap();
        assert!(c.published_schema(&name()).is_none());
        let s = c.full_table_schema(&name()).unwrap();
        c.set_schema(&name(), &s).unwrap();
        assert_eq!(c.published_schema(&name()), Some(s));
    }
}
