//! Unified error model for the reconciliation engine and the command executor.
//! Every fatal condition of a configure pass maps onto one variant here, and every
//! variant carries the identifier(s) that caused it so the job submitter can act on it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("projected column {column} not in list of columns from database")]
    ColumnNotFound { column: String },

    #[error("database column {column} not found in catalog table {table}")]
    ColumnNotInCatalog { column: String, table: String },

    #[error("catalog field {column} could not be found in table {table} schema or partition schema")]
    SchemaFieldNotFound { column: String, table: String },

    #[error("catalog table {table} has complex field types ({fields}); only primitive fields are supported")]
    UnsupportedComplexType { table: String, fields: String },

    #[error("catalog table {table} uses unsupported partitioning key type for column {column}: {type_name}; only string fields are allowed in partition columns")]
    UnsupportedPartitionType { table: String, column: String, type_name: String },

    #[error("provided partition key {key} is not part of the partition keys for table {table}")]
    StaticKeyNotPartitioned { key: String, table: String },

    #[error("dynamic partition keys are not present in the database columns; missing keys = {keys}")]
    MissingDynamicPartitionKeys { keys: String },

    #[error("catalog does not support the SQL type {type_name} for column {column}")]
    UnsupportedType { column: String, type_name: String },

    #[error("column {column} not found while mapping database columns to catalog columns")]
    UnknownOverrideColumn { column: String },

    #[error("database column {column} is listed more than once (names compare case-insensitively)")]
    DuplicateColumn { column: String },

    #[error("catalog table {table} declares field {field} more than once")]
    DuplicateCatalogField { table: String, field: String },

    #[error("no column source: supply explicit columns, a table, a procedure call or a query")]
    NoColumnSource,

    #[error("catalog table {table} not found")]
    TableNotFound { table: String },

    #[error("catalog CLI exited with status {code}")]
    ExternalToolFailed { code: i32 },

    #[error("catalog CLI did not finish within {secs}s and was killed")]
    ExternalToolTimedOut { secs: u64 },

    #[error("catalog CLI invocation failed: {0}")]
    ToolInvocationFailed(String),

    #[error("catalog service error: {0}")]
    Catalog(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Stable snake_case code for logs and machine consumers.
    pub fn code_str(&self) -> &'static str {
        match self {
            BridgeError::ColumnNotFound { .. } => "column_not_found",
            BridgeError::ColumnNotInCatalog { .. } => "column_not_in_catalog",
            BridgeError::SchemaFieldNotFound { .. } => "schema_field_not_found",
            BridgeError::UnsupportedComplexType { .. } => "unsupported_complex_type",
            BridgeError::UnsupportedPartitionType { .. } => "unsupported_partition_type",
            BridgeError::StaticKeyNotPartitioned { .. } => "static_key_not_partitioned",
            BridgeError::MissingDynamicPartitionKeys { .. } => "missing_dynamic_partition_keys",
            BridgeError::UnsupportedType { .. } => "unsupported_type",
            BridgeError::UnknownOverrideColumn { .. } => "unknown_override_column",
            BridgeError::DuplicateColumn { .. } => "duplicate_column",
            BridgeError::DuplicateCatalogField { .. } => "duplicate_catalog_field",
            BridgeError::NoColumnSource => "no_column_source",
            BridgeError::TableNotFound { .. } => "table_not_found",
            BridgeError::ExternalToolFailed { .. } => "external_tool_failed",
            BridgeError::ExternalToolTimedOut { .. } => "external_tool_timed_out",
            BridgeError::ToolInvocationFailed(_) => "tool_invocation_failed",
            BridgeError::Catalog(_) => "catalog_error",
            BridgeError::Config(_) => "config_error",
            BridgeError::Io(_) => "io_error",
        }
    }

    /// Exit status the catalog CLI reported, if this error came from it.
    pub fn tool_exit_code(&self) -> Option<i32> {
        match self {
            BridgeError::ExternalToolFailed { code } => Some(*code),
            _ => None,
        }
    }

    pub fn catalog<S: Into<String>>(msg: S) -> Self { BridgeError::Catalog(msg.into()) }
    pub fn config<S: Into<String>>(msg: S) -> Self { BridgeError::Config(msg.into()) }
    pub fn invocation<S: Into<String>>(msg: S) -> Self { BridgeError::ToolInvocationFailed(msg.into()) }
}

pub type BridgeResult<T> = Result<T, BridgeError>;

impl From<anyhow::Error> for BridgeError {
    fn from(err: anyhow::Error) -> Self {
        // Default mapping: collaborator failures surface as catalog errors unless downcast elsewhere
        match err.downcast::<BridgeError>() {
            Ok(inner) => inner,
            Err(other) => BridgeError::Catalog(format!("{:#}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_mapping() {
        assert_eq!(BridgeError::ColumnNotFound { column: "a".into() }.code_str(), "column_not_found");
        assert_eq!(BridgeError::ExternalToolFailed { code: 3 }.code_str(), "external_tool_failed");
        assert_eq!(BridgeError::invocation("x").code_str(), "tool_invocation_failed");
        assert_eq!(BridgeError::NoColumnSource.code_str(), "no_column_source");
    }

    #[test]
    fn messages_name_offenders() {
        let e = BridgeError::MissingDynamicPartitionKeys { keys: "p,q".into() };
        assert!(e.to_string().contains("missing keys = p,q"));
        let e = BridgeError::StaticKeyNotPartitioned { key: "dt".into(), table: "db.t".into() };
        assert!(e.to_string().contains("dt"));
        assert!(e.to_string().contains("db.t"));
    }

    #[test]
    fn tool_exit_code_preserved() {
        assert_eq!(BridgeError::ExternalToolFailed { code: 17 }.tool_exit_code(), Some(17));
        assert_eq!(BridgeError::NoColumnSource.tool_exit_code(), None);
    }

    #[test]
    fn anyhow_roundtrip_keeps_variant() {
        let any: anyhow::Error = BridgeError::TableNotFound { table: "db.t".into() }.into();
        match BridgeError::from(any) {
            BridgeError::TableNotFound { table } => assert_eq!(table, "db.t"),
            other => panic!("unexpected {:?}", other),
        }
        let plain = BridgeError::from(anyhow::anyhow!("metastore down"));
        assert_eq!(plain.code_str(), "catalog_error");
    }
}
