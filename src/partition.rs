//! Static/dynamic partition key validation.

use std::collections::BTreeMap;

use tracing::debug;

use crate::catalog::{PartitionFilter, TableSchema};
use crate::error::{BridgeError, BridgeResult};

/// Check the caller's static key against the partition schema and return the
/// remaining (dynamic) partition keys in schema order.
///
/// The static key must match a partition field name exactly.
pub fn validate_static_key(partition_schema: &TableSchema, static_key: Option<&str>, table: &str) -> BridgeResult<Vec<String>> {
    if let Some(key) = static_key {
        if !partition_schema.fields().iter().any(|f| f.name == key) {
            return Err(BridgeError::StaticKeyNotPartitioned { key: key.to_string(), table: table.to_string() });
        }
    }
    let dynamic: Vec<String> = partition_schema
        .fields()
        .iter()
        .map(|f| f.name.clone())
        .filter(|name| Some(name.as_str()) != static_key)
        .collect();
    debug!(target: "catbridge::reconcile", "dynamic partition keys for {} = {:?}", table, dynamic);
    Ok(dynamic)
}

/// Every dynamic key must be a database column. All missing keys are reported at once.
pub fn validate_dynamic_keys(dynamic_keys: &[String], db_columns: &[String]) -> BridgeResult<()> {
    let missing: Vec<&str> = dynamic_keys
        .iter()
        .filter(|k| !db_columns.iter().any(|c| c == *k))
        .map(String::as_str)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(BridgeError::MissingDynamicPartitionKeys { keys: missing.join(",") })
    }
}

/// Catalog filter expression selecting the static partition, e.g. `dt='2024-01-01'`.
pub fn filter_string(key: &str, value: &str) -> String {
    format!("{}='{}'", key, value.replace('\'', "\\'"))
}

pub fn filter_map(key: &str, value: &str) -> PartitionFilter {
    let mut m = BTreeMap::new();
    m.insert(key.to_string(), value.to_string());
    m
}
