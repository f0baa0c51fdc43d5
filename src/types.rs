//! SQL type codes and their catalog counterparts.
//!
//! Codes follow the standard SQL/CLI numbering used by database drivers. The
//! mapping functions are pure and total over that code space.

use crate::error::{BridgeError, BridgeResult};

pub type SqlTypeCode = i32;

pub mod sql {
    use super::SqlTypeCode;

    pub const BIT: SqlTypeCode = -7;
    pub const TINYINT: SqlTypeCode = -6;
    pub const SMALLINT: SqlTypeCode = 5;
    pub const INTEGER: SqlTypeCode = 4;
    pub const BIGINT: SqlTypeCode = -5;
    pub const FLOAT: SqlTypeCode = 6;
    pub const REAL: SqlTypeCode = 7;
    pub const DOUBLE: SqlTypeCode = 8;
    pub const NUMERIC: SqlTypeCode = 2;
    pub const DECIMAL: SqlTypeCode = 3;
    pub const CHAR: SqlTypeCode = 1;
    pub const VARCHAR: SqlTypeCode = 12;
    pub const LONGVARCHAR: SqlTypeCode = -1;
    pub const DATE: SqlTypeCode = 91;
    pub const TIME: SqlTypeCode = 92;
    pub const TIMESTAMP: SqlTypeCode = 93;
    pub const BINARY: SqlTypeCode = -2;
    pub const VARBINARY: SqlTypeCode = -3;
    pub const LONGVARBINARY: SqlTypeCode = -4;
    pub const NULL: SqlTypeCode = 0;
    pub const OTHER: SqlTypeCode = 1111;
    pub const JAVA_OBJECT: SqlTypeCode = 2000;
    pub const DISTINCT: SqlTypeCode = 2001;
    pub const STRUCT: SqlTypeCode = 2002;
    pub const ARRAY: SqlTypeCode = 2003;
    pub const BLOB: SqlTypeCode = 2004;
    pub const CLOB: SqlTypeCode = 2005;
    pub const REF: SqlTypeCode = 2006;
    pub const DATALINK: SqlTypeCode = 70;
    pub const BOOLEAN: SqlTypeCode = 16;
    pub const ROWID: SqlTypeCode = -8;
    pub const NCHAR: SqlTypeCode = -15;
    pub const NVARCHAR: SqlTypeCode = -9;
    pub const LONGNVARCHAR: SqlTypeCode = -16;
    pub const NCLOB: SqlTypeCode = 2011;
    pub const SQLXML: SqlTypeCode = 2009;
}

pub const UNKNOWN_TYPE_NAME: &str = "UNKNOWN";

/// Catalog type name for a SQL type code, or `None` when the catalog has no
/// primitive that can hold it.
pub fn catalog_type_opt(code: SqlTypeCode) -> Option<&'static str> {
    use sql::*;
    match code {
        INTEGER | SMALLINT => Some("int"),
        TINYINT => Some("tinyint"),
        BIGINT => Some("bigint"),
        CHAR | VARCHAR | LONGVARCHAR | NCHAR | NVARCHAR | LONGNVARCHAR
        | DATE | TIME | TIMESTAMP | CLOB => Some("string"),
        NUMERIC | DECIMAL | FLOAT | DOUBLE => Some("double"),
        REAL => Some("float"),
        BIT | BOOLEAN => Some("boolean"),
        BINARY | VARBINARY | LONGVARBINARY | BLOB => Some("binary"),
        _ => None,
    }
}

/// Catalog type name for the SQL type of `column`.
pub fn catalog_type(column: &str, code: SqlTypeCode) -> BridgeResult<&'static str> {
    catalog_type_opt(code).ok_or_else(|| BridgeError::UnsupportedType {
        column: column.to_string(),
        type_name: display_name(code).to_string(),
    })
}

/// True when the catalog type is a less precise stand-in for the SQL type.
pub fn is_improvised(code: SqlTypeCode) -> bool {
    use sql::*;
    matches!(code, DATE | TIME | TIMESTAMP | DECIMAL | NUMERIC)
}

/// Name of the in-memory value type a transfer task materializes for the SQL type.
pub fn value_type_name(code: SqlTypeCode) -> Option<&'static str> {
    use sql::*;
    match code {
        INTEGER | SMALLINT | TINYINT => Some("i32"),
        BIGINT => Some("i64"),
        CHAR | VARCHAR | LONGVARCHAR | NCHAR | NVARCHAR | LONGNVARCHAR => Some("String"),
        NUMERIC | DECIMAL => Some("Decimal"),
        BIT | BOOLEAN => Some("bool"),
        REAL => Some("f32"),
        FLOAT | DOUBLE => Some("f64"),
        DATE => Some("NaiveDate"),
        TIME => Some("NaiveTime"),
        TIMESTAMP => Some("NaiveDateTime"),
        BINARY | VARBINARY | LONGVARBINARY => Some("Vec<u8>"),
        CLOB => Some("ClobRef"),
        BLOB => Some("BlobRef"),
        _ => None,
    }
}

/// Human readable label for diagnostics. Never fails.
pub fn display_name(code: SqlTypeCode) -> &'static str {
    use sql::*;
    match code {
        BIT => "BIT",
        TINYINT => "TINYINT",
        SMALLINT => "SMALLINT",
        INTEGER => "INTEGER",
        BIGINT => "BIGINT",
        FLOAT => "FLOAT",
        REAL => "REAL",
        DOUBLE => "DOUBLE",
        NUMERIC => "NUMERIC",
        DECIMAL => "DECIMAL",
        CHAR => "CHAR",
        VARCHAR => "VARCHAR",
        LONGVARCHAR => "LONGVARCHAR",
        DATE => "DATE",
        TIME => "TIME",
        TIMESTAMP => "TIMESTAMP",
        BINARY => "BINARY",
        VARBINARY => "VARBINARY",
        LONGVARBINARY => "LONGVARBINARY",
        NULL => "NULL",
        OTHER => "OTHER",
        JAVA_OBJECT => "JAVA_OBJECT",
        DISTINCT => "DISTINCT",
        STRUCT => "STRUCT",
        ARRAY => "ARRAY",
        BLOB => "BLOB",
        CLOB => "CLOB",
        REF => "REF",
        DATALINK => "DATALINK",
        BOOLEAN => "BOOLEAN",
        ROWID => "ROWID",
        NCHAR => "NCHAR",
        NVARCHAR => "NVARCHAR",
        LONGNVARCHAR => "LONGNVARCHAR",
        NCLOB => "NCLOB",
        SQLXML => "SQLXML",
        _ => UNKNOWN_TYPE_NAME,
    }
}
