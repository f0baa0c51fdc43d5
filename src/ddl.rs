//! ddl
//! ---
//! CREATE TABLE rendering for the catalog, and the matching parser used by the
//! embedded catalog CLI to apply generated scripts.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::catalog::FieldSchema;
use crate::config::DEFAULT_STORAGE_CLAUSE;
use crate::db::DbMetadata;
use crate::error::{BridgeError, BridgeResult};
use crate::ident::QualifiedName;
use crate::registry::{ColumnRegistry, TypeOverrides};

/// Render the catalog DDL for the registry's columns.
///
/// The static partition key is left out of the column list and declared as a
/// string partition instead. Overrides win over mapped types.
pub fn generate_create_table(
    name: &QualifiedName,
    registry: &ColumnRegistry,
    overrides: &TypeOverrides,
    static_key: Option<&str>,
    storage_clause: Option<&str>,
    mapper: &dyn DbMetadata,
) -> BridgeResult<String> {
    let mut cols: Vec<String> = Vec::with_capacity(registry.names().len());
    for col in registry.names() {
        if static_key == Some(col.as_str()) {
            continue;
        }
        let ty = match overrides.get(col) {
            Some(t) => t.to_string(),
            None => {
                let code = registry.type_of(col).ok_or_else(|| BridgeError::ColumnNotFound { column: col.clone() })?;
                mapper.to_catalog_type(col, code)?
            }
        };
        cols.push(format!("{} {}", col, ty));
    }

    let mut sb = String::new();
    sb.push_str(&format!("create table {} (\n\t", name));
    sb.push_str(&cols.join(",\n\t"));
    sb.push_str(")\n");
    if let Some(key) = static_key {
        sb.push_str(&format!("partitioned by (\n\t{} string)\n", key));
    }
    sb.push_str(storage_clause.unwrap_or(DEFAULT_STORAGE_CLAUSE));
    info!(target: "catbridge::ddl", "Catalog create table statement: \n\n{}", sb);
    Ok(sb)
}

/// Parsed form of a CREATE TABLE statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTableStmt {
    pub name: QualifiedName,
    pub if_not_exists: bool,
    pub columns: Vec<FieldSchema>,
    pub partitions: Vec<FieldSchema>,
    pub storage: Option<String>,
}

static CREATE_HEAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^\s*create\s+(?:external\s+)?table\s+(if\s+not\s+exists\s+)?([A-Za-z0-9_.]+)\s*\(").expect("static regex")
});

static PARTITIONED_BY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)^\s*partitioned\s+by\s*\(").expect("static regex"));

/// Parse `CREATE TABLE [IF NOT EXISTS] <db>.<table> (col type, ...) [PARTITIONED BY (...)] [storage]`.
pub fn parse_create_table(stmt: &str) -> BridgeResult<CreateTableStmt> {
    let caps = CREATE_HEAD
        .captures(stmt)
        .ok_or_else(|| BridgeError::catalog(format!("unsupported statement: {}", first_line(stmt))))?;
    let if_not_exists = caps.get(1).is_some();
    let name = QualifiedName::parse(&caps[2]);
    let head_end = caps.get(0).map(|m| m.end()).unwrap_or(0);

    let (cols_text, rest) = split_paren_group(&stmt[head_end..])?;
    let columns = parse_column_defs(cols_text)?;

    let (partitions, rest) = match PARTITIONED_BY.find(rest) {
        Some(m) => {
            let (ptext, after) = split_paren_group(&rest[m.end()..])?;
            (parse_column_defs(ptext)?, after)
        }
        None => (Vec::new(), rest),
    };
    let storage = rest.trim();
    Ok(CreateTableStmt {
        name,
        if_not_exists,
        columns,
        partitions,
        storage: if storage.is_empty() { None } else { Some(storage.to_string()) },
    })
}

fn first_line(s: &str) -> &str {
    s.trim().lines().next().unwrap_or("")
}

// Input starts just after an opening '('; returns the group body and the text after its ')'.
fn split_paren_group(s: &str) -> BridgeResult<(&str, &str)> {
    let mut depth = 1i32;
    for (i, ch) in s.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&s[..i], &s[i + 1..]));
                }
            }
            _ => {}
        }
    }
    Err(BridgeError::catalog("expected ) in CREATE TABLE"))
}

fn parse_column_defs(text: &str) -> BridgeResult<Vec<FieldSchema>> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut depth = 0i32;
    let mut defs: Vec<String> = Vec::new();
    for ch in text.chars() {
        match ch {
            '(' | '<' => { depth += 1; cur.push(ch); }
            ')' | '>' => { depth -= 1; cur.push(ch); }
            ',' if depth == 0 => { defs.push(std::mem::take(&mut cur)); }
            _ => cur.push(ch),
        }
    }
    if !cur.trim().is_empty() { defs.push(cur); }
    for def in defs {
        let def = def.trim();
        let (name, ty) = def
            .split_once(char::is_whitespace)
            .ok_or_else(|| BridgeError::catalog(format!("column definition without type: '{}'", def)))?;
        out.push(FieldSchema::parse(name.trim(), ty.trim())?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldType, PrimitiveType};
    use crate::db::MemoryDb;
    use crate::types::sql;
    use std::collections::BTreeMap;

    fn reg(cols: &[(&str, i32)]) -> ColumnRegistry {
        ColumnRegistry::from_columns(cols).unwrap()
    }

    #[test]
    fn default_storage_no_partition() {
        let ddl = generate_create_table(
            &QualifiedName::new("db", "tbl"),
            &reg(&[("a", sql::VARCHAR), ("b", sql::INTEGER)]),
            &TypeOverrides::default(),
            None,
            None,
            &MemoryDb::new(),
        ).unwrap();
        assert_eq!(ddl, "create table db.tbl (\n\ta string,\n\tb int)\nstored as rcfile");
    }

    #[test]
    fn static_key_and_override_and_storage() {
        let mut raw = BTreeMap::new();
        raw.insert("B".to_string(), "bigint".to_string());
        let ddl = generate_create_table(
            &QualifiedName::new("db", "tbl"),
            &reg(&[("a", sql::VARCHAR), ("b", sql::INTEGER), ("dt", sql::VARCHAR)]),
            &TypeOverrides::from_map(&raw).unwrap(),
            Some("dt"),
            Some("stored as orcfile"),
            &MemoryDb::new(),
        ).unwrap();
        assert_eq!(ddl, "create table db.tbl (\n\ta string,\n\tb bigint)\npartitioned by (\n\tdt string)\nstored as orcfile");
    }

    #[test]
    fn unmapped_type_is_reported() {
        let err = generate_create_table(
            &QualifiedName::new("db", "tbl"),
            &reg(&[("shape", sql::STRUCT)]),
            &TypeOverrides::default(),
            None,
            None,
            &MemoryDb::new(),
        ).unwrap_err();
        assert_eq!(err.code_str(), "unsupported_type");
    }

    #[test]
    fn parse_generated_statement() {
        let stmt = parse_create_table("create table db.tbl (\n\ta string,\n\tb decimal(10,2))\npartitioned by (\n\tdt string)\nstored as rcfile").unwrap();
        assert_eq!(stmt.name, QualifiedName::new("db", "tbl"));
        assert!(!stmt.if_not_exists);
        assert_eq!(stmt.columns.len(), 2);
        assert_eq!(stmt.columns[1].field_type, FieldType::Primitive(PrimitiveType::Decimal));
        assert_eq!(stmt.partitions, vec![FieldSchema::primitive("dt", PrimitiveType::String)]);
        assert_eq!(stmt.storage.as_deref(), Some("stored as rcfile"));
    }

    #[test]
    fn parse_complex_columns_and_if_not_exists() {
        let stmt = parse_create_table("CREATE TABLE IF NOT EXISTS t (m map<string,int>, s struct<a:int,b:string>)").unwrap();
        assert!(stmt.if_not_exists);
        assert_eq!(stmt.name, QualifiedName::new("default", "t"));
        assert_eq!(stmt.columns[0].type_string(), "map<string,int>");
        assert!(stmt.columns[1].is_complex());
        assert!(stmt.partitions.is_empty());
        assert!(stmt.storage.is_none());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_create_table("drop table t").is_err());
        assert!(parse_create_table("create table t (a string").is_err());
        assert!(parse_create_table("create table t (a)").is_err());
    }
}
