//! Schema reconciliation
//! ---------------------
//! Maps the database column registry onto a catalog table's full schema:
//! splits off the partition schema, builds the projected (data) schema the job
//! writes, derives dynamic partition keys and resolves every database column to
//! a catalog ordinal.
//!
//! The pass is pure: it reads its inputs and returns a `Reconciliation`, leaving
//! publication to the caller so a failure never leaves partial state behind.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::TableSchema;
use crate::db::DbMetadata;
use crate::error::{BridgeError, BridgeResult};
use crate::ident::QualifiedName;
use crate::partition::validate_static_key;
use crate::registry::{ColumnRegistry, TypeOverrides};
use crate::types::{display_name, is_improvised};

pub struct ReconcileInput<'a> {
    pub table: &'a QualifiedName,
    pub registry: &'a ColumnRegistry,
    pub full_schema: &'a TableSchema,
    /// Field count of the catalog's data schema view.
    pub data_field_count: usize,
    pub overrides: &'a TypeOverrides,
    pub static_key: Option<&'a str>,
    pub mapper: &'a dyn DbMetadata,
}

/// Resolved type disagrees with the catalog's declared type. Not fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeMismatch {
    pub column: String,
    pub catalog_type: String,
    pub expected: String,
    pub sql_type: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub projected: TableSchema,
    pub partition: TableSchema,
    /// Catalog ordinal for each database column, in registry order.
    pub field_positions: Vec<usize>,
    pub dynamic_keys: Vec<String>,
    pub type_mismatches: Vec<TypeMismatch>,
}

pub fn reconcile(input: &ReconcileInput<'_>) -> BridgeResult<Reconciliation> {
    let table = input.table.to_string();
    let full = input.full_schema;
    full.ensure_unique_names(&table)?;
    info!(target: "catbridge::reconcile", "Catalog full table schema fields = {:?}", full.field_names());

    let partition_count = full.len().saturating_sub(input.data_field_count);
    let partition = full.tail(partition_count);
    for f in partition.fields() {
        if !f.field_type.is_string() {
            return Err(BridgeError::UnsupportedPartitionType {
                table: table.clone(),
                column: f.name.clone(),
                type_name: f.type_string(),
            });
        }
    }
    info!(target: "catbridge::reconcile", "Catalog table partitioning key fields = {:?}", partition.field_names());

    input.overrides.ensure_known(input.registry)?;

    let mut projected = Vec::with_capacity(input.registry.names().len());
    for col in input.registry.names() {
        if input.static_key == Some(col.as_str()) {
            continue;
        }
        let field = full
            .field(col)
            .ok_or_else(|| BridgeError::ColumnNotInCatalog { column: col.clone(), table: table.clone() })?;
        projected.push(field.clone());
    }
    let projected = TableSchema::new(projected);
    info!(target: "catbridge::reconcile", "Catalog projected schema fields = {:?}", projected.field_names());

    let dynamic_keys = validate_static_key(&partition, input.static_key, &table)?;

    let complex: Vec<&str> = projected.fields().iter().filter(|f| f.is_complex()).map(|f| f.name.as_str()).collect();
    if !complex.is_empty() {
        return Err(BridgeError::UnsupportedComplexType { table, fields: complex.join(", ") });
    }

    let (field_positions, type_mismatches) = resolve_positions(input, &table)?;

    Ok(Reconciliation { projected, partition, field_positions, dynamic_keys, type_mismatches })
}

fn resolve_positions(input: &ReconcileInput<'_>, table: &str) -> BridgeResult<(Vec<usize>, Vec<TypeMismatch>)> {
    let full = input.full_schema;
    let mut positions = Vec::with_capacity(input.registry.names().len());
    let mut mismatches = Vec::new();
    for col in input.registry.names() {
        let code = input.registry.type_of(col).ok_or_else(|| BridgeError::ColumnNotFound { column: col.clone() })?;
        let expected = match input.overrides.get(col) {
            Some(t) => {
                debug!(target: "catbridge::reconcile", "user type mapping for catalog field {} = {}", col, t);
                t.to_string()
            }
            None => input.mapper.to_catalog_type(col, code)?,
        };
        let ordinal = full
            .position(col)
            .ok_or_else(|| BridgeError::SchemaFieldNotFound { column: col.clone(), table: table.to_string() })?;

        let declared = full.fields()[ordinal].type_string();
        if !declared.eq_ignore_ascii_case(&expected) {
            warn!(
                target: "catbridge::reconcile",
                "The catalog field {} has type {}. Expected = {} based on database column type : {}. The job can fail if types are not assignment compatible",
                col, declared, expected, display_name(code)
            );
            mismatches.push(TypeMismatch { column: col.clone(), catalog_type: declared, expected: expected.clone(), sql_type: display_name(code) });
        }
        if is_improvised(code) {
            warn!(target: "catbridge::reconcile", "Column {} had to be cast to a less precise type {} in the catalog", col, expected);
        }
        positions.push(ordinal);
    }
    Ok((positions, mismatches))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldSchema, FieldType, PrimitiveType};
    use crate::db::MemoryDb;
    use crate::types::sql;
    use std::collections::BTreeMap;

    fn schema(fields: &[(&str, &str)]) -> TableSchema {
        fields.iter().map(|(n, t)| FieldSchema::parse(*n, t).unwrap()).collect()
    }

    fn run(
        full: &TableSchema,
        data_count: usize,
        cols: &[(&str, i32)],
        overrides: &TypeOverrides,
        static_key: Option<&str>,
    ) -> BridgeResult<Reconciliation> {
        let registry = ColumnRegistry::from_columns(cols).unwrap();
        let db = MemoryDb::new();
        let table = QualifiedName::new("db", "t");
        reconcile(&ReconcileInput {
            table: &table,
            registry: &registry,
            full_schema: full,
            data_field_count: data_count,
            overrides,
            static_key,
            mapper: &db,
        })
    }

    fn abp() -> TableSchema {
        schema(&[("a", "string"), ("b", "int"), ("p", "string")])
    }

    #[test]
    fn static_partition_excluded_from_projection() {
        let r = run(&abp(), 2, &[("a", sql::VARCHAR), ("b", sql::INTEGER)], &TypeOverrides::default(), Some("p")).unwrap();
        assert_eq!(r.projected.field_names(), vec!["a", "b"]);
        assert_eq!(r.partition.field_names(), vec!["p"]);
        assert!(r.dynamic_keys.is_empty());
        assert_eq!(r.field_positions, vec![0, 1]);
        assert!(r.type_mismatches.is_empty());
    }

    #[test]
    fn dynamic_partition_from_db_column() {
        let cols = [("a", sql::VARCHAR), ("b", sql::INTEGER), ("p", sql::VARCHAR)];
        let r = run(&abp(), 2, &cols, &TypeOverrides::default(), None).unwrap();
        assert_eq!(r.dynamic_keys, vec!["p".to_string()]);
        assert_eq!(r.projected.field_names(), vec!["a", "b", "p"]);
        assert_eq!(r.field_positions, vec![0, 1, 2]);

        let again = run(&abp(), 2, &cols, &TypeOverrides::default(), None).unwrap();
        assert_eq!(again.field_positions, r.field_positions);
    }

    #[test]
    fn positions_follow_catalog_order_case_insensitively() {
        let full = schema(&[("ID", "int"), ("Name", "string")]);
        let r = run(&full, 2, &[("name", sql::VARCHAR), ("id", sql::INTEGER)], &TypeOverrides::default(), None).unwrap();
        assert_eq!(r.field_positions, vec![1, 0]);
        assert!(r.partition.is_empty());
    }

    #[test]
    fn non_string_partition_rejected() {
        let full = schema(&[("a", "string"), ("p", "int")]);
        let err = run(&full, 1, &[("a", sql::VARCHAR)], &TypeOverrides::default(), None).unwrap_err();
        match err {
            BridgeError::UnsupportedPartitionType { column, type_name, .. } => {
                assert_eq!(column, "p");
                assert_eq!(type_name, "int");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn static_key_must_be_partition() {
        let err = run(&abp(), 2, &[("a", sql::VARCHAR)], &TypeOverrides::default(), Some("b")).unwrap_err();
        assert_eq!(err.code_str(), "static_key_not_partitioned");
        // exact match only
        let err = run(&abp(), 2, &[("a", sql::VARCHAR)], &TypeOverrides::default(), Some("P")).unwrap_err();
        assert_eq!(err.code_str(), "static_key_not_partitioned");
    }

    #[test]
    fn column_missing_from_catalog() {
        let err = run(&abp(), 2, &[("a", sql::VARCHAR), ("zzz", sql::INTEGER)], &TypeOverrides::default(), None).unwrap_err();
        match err {
            BridgeError::ColumnNotInCatalog { column, table } => {
                assert_eq!(column, "zzz");
                assert_eq!(table, "db.t");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn complex_fields_listed_together() {
        let full = schema(&[("m", "map<string,int>"), ("a", "string"), ("l", "array<int>")]);
        let cols = [("m", sql::VARCHAR), ("a", sql::VARCHAR), ("l", sql::VARCHAR)];
        let err = run(&full, 3, &cols, &TypeOverrides::default(), None).unwrap_err();
        match err {
            BridgeError::UnsupportedComplexType { fields, .. } => assert_eq!(fields, "m, l"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn overrides_must_name_db_columns() {
        let mut raw = BTreeMap::new();
        raw.insert("nope".to_string(), "string".to_string());
        let overrides = TypeOverrides::from_map(&raw).unwrap();
        let err = run(&abp(), 2, &[("a", sql::VARCHAR)], &overrides, None).unwrap_err();
        assert_eq!(err.code_str(), "unknown_override_column");
    }

    #[test]
    fn mismatches_warn_but_do_not_fail() {
        let mut raw = BTreeMap::new();
        raw.insert("A".to_string(), "bigint".to_string());
        let overrides = TypeOverrides::from_map(&raw).unwrap();
        let cols = [("a", sql::VARCHAR), ("b", sql::DECIMAL)];
        let r = run(&abp(), 2, &cols, &overrides, Some("p")).unwrap();
        let found: Vec<(&str, &str, &str)> = r
            .type_mismatches
            .iter()
            .map(|m| (m.column.as_str(), m.catalog_type.as_str(), m.expected.as_str()))
            .collect();
        assert_eq!(found, vec![("a", "string", "bigint"), ("b", "int", "double")]);
        assert_eq!(r.type_mismatches[1].sql_type, "DECIMAL");
    }

    #[test]
    fn unmappable_type_is_fatal() {
        let full = schema(&[("a", "string")]);
        let err = run(&full, 1, &[("a", sql::STRUCT)], &TypeOverrides::default(), None).unwrap_err();
        assert_eq!(err.code_str(), "unsupported_type");
        let mut raw = BTreeMap::new();
        raw.insert("a".to_string(), "string".to_string());
        let r = run(&full, 1, &[("a", sql::STRUCT)], &TypeOverrides::from_map(&raw).unwrap(), None).unwrap();
        assert_eq!(r.field_positions, vec![0]);
    }

    #[test]
    fn duplicate_catalog_fields_rejected() {
        let full = TableSchema::new(vec![
            FieldSchema::primitive("a", PrimitiveType::String),
            FieldSchema::new("A", FieldType::Primitive(PrimitiveType::Int)),
        ]);
        let err = run(&full, 2, &[("a", sql::VARCHAR)], &TypeOverrides::default(), None).unwrap_err();
        assert_eq!(err.code_str(), "duplicate_catalog_field");
    }

    #[test]
    fn data_view_not_shorter_means_no_partitions() {
        let r = run(&abp(), 5, &[("a", sql::VARCHAR)], &TypeOverrides::default(), None).unwrap();
        assert!(r.partition.is_empty());
        assert!(r.dynamic_keys.is_empty());
    }
}
