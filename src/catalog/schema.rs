use std::fmt;
use std::str::FromStr;

use crate::error::{BridgeError, BridgeResult};
use crate::ident::{canonical, same_ident};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Tinyint,
    Smallint,
    Int,
    Bigint,
    Boolean,
    Float,
    Double,
    String,
    Binary,
    Date,
    Timestamp,
    Decimal,
}

impl PrimitiveType {
    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveType::Tinyint => "tinyint",
            PrimitiveType::Smallint => "smallint",
            PrimitiveType::Int => "int",
            PrimitiveType::Bigint => "bigint",
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Float => "float",
            PrimitiveType::Double => "double",
            PrimitiveType::String => "string",
            PrimitiveType::Binary => "binary",
            PrimitiveType::Date => "date",
            PrimitiveType::Timestamp => "timestamp",
            PrimitiveType::Decimal => "decimal",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let p = match name {
            "tinyint" => PrimitiveType::Tinyint,
            "smallint" => PrimitiveType::Smallint,
            "int" | "integer" => PrimitiveType::Int,
            "bigint" => PrimitiveType::Bigint,
            "boolean" => PrimitiveType::Boolean,
            "float" => PrimitiveType::Float,
            "double" => PrimitiveType::Double,
            "string" => PrimitiveType::String,
            "binary" => PrimitiveType::Binary,
            "date" => PrimitiveType::Date,
            "timestamp" => PrimitiveType::Timestamp,
            "decimal" => PrimitiveType::Decimal,
            _ => return None,
        };
        Some(p)
    }
}

/// Declared type of a catalog field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Primitive(PrimitiveType),
    Array(Box<FieldType>),
    Map(Box<FieldType>, Box<FieldType>),
    Struct(Vec<FieldSchema>),
}

impl FieldType {
    pub fn is_complex(&self) -> bool { !matches!(self, FieldType::Primitive(_)) }

    pub fn is_string(&self) -> bool { matches!(self, FieldType::Primitive(PrimitiveType::String)) }

    /// Catalog type string, e.g. `int` or `map<string,array<int>>`.
    pub fn type_string(&self) -> String {
        match self {
            FieldType::Primitive(p) => p.name().to_string(),
            FieldType::Array(inner) => format!("array<{}>", inner.type_string()),
            FieldType::Map(k, v) => format!("map<{},{}>", k.type_string(), v.type_string()),
            FieldType::Struct(fields) => {
                let parts: Vec<String> = fields.iter().map(|f| format!("{}:{}", f.name, f.field_type.type_string())).collect();
                format!("struct<{}>", parts.join(","))
            }
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.type_string()) }
}

impl FromStr for FieldType {
    type Err = BridgeError;

    fn from_str(s: &str) -> BridgeResult<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        let mut p = TypeParser { src: lowered.as_bytes(), pos: 0, text: s };
        let t = p.parse_type()?;
        p.skip_ws();
        if p.pos != p.src.len() {
            return Err(p.error("trailing input"));
        }
        Ok(t)
    }
}

struct TypeParser<'a> {
    src: &'a [u8],
    pos: usize,
    text: &'a str,
}

impl<'a> TypeParser<'a> {
    fn error(&self, what: &str) -> BridgeError {
        BridgeError::catalog(format!("invalid catalog type '{}': {} at offset {}", self.text.trim(), what, self.pos))
    }

    fn skip_ws(&mut self) {
        while self.pos < self.src.len() && self.src[self.pos].is_ascii_whitespace() { self.pos += 1; }
    }

    fn ident(&mut self) -> BridgeResult<String> {
        self.skip_ws();
        let start = self.pos;
        while self.pos < self.src.len() && (self.src[self.pos].is_ascii_alphanumeric() || self.src[self.pos] == b'_') {
            self.pos += 1;
        }
        if start == self.pos { return Err(self.error("expected identifier")); }
        Ok(String::from_utf8_lossy(&self.src[start..self.pos]).into_owned())
    }

    fn expect(&mut self, ch: u8) -> BridgeResult<()> {
        self.skip_ws();
        if self.pos < self.src.len() && self.src[self.pos] == ch {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", ch as char)))
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.src.get(self.pos).copied()
    }

    // Precision/length arguments such as decimal(10,2) or varchar(20) do not change the field kind
    fn skip_params(&mut self) -> BridgeResult<()> {
        if self.peek() == Some(b'(') {
            match self.src[self.pos..].iter().position(|c| *c == b')') {
                Some(off) => self.pos += off + 1,
                None => return Err(self.error("unterminated type parameters")),
            }
        }
        Ok(())
    }

    fn parse_type(&mut self) -> BridgeResult<FieldType> {
        let name = self.ident()?;
        match name.as_str() {
            "array" => {
                self.expect(b'<')?;
                let inner = self.parse_type()?;
                self.expect(b'>')?;
                Ok(FieldType::Array(Box::new(inner)))
            }
            "map" => {
                self.expect(b'<')?;
                let k = self.parse_type()?;
                self.expect(b',')?;
                let v = self.parse_type()?;
                self.expect(b'>')?;
                Ok(FieldType::Map(Box::new(k), Box::new(v)))
            }
            "struct" => {
                self.expect(b'<')?;
                let mut fields = Vec::new();
                loop {
                    let fname = self.ident()?;
                    self.expect(b':')?;
                    let ftype = self.parse_type()?;
                    fields.push(FieldSchema::new(fname, ftype));
                    match self.peek() {
                        Some(b',') => { self.pos += 1; }
                        _ => break,
                    }
                }
                self.expect(b'>')?;
                Ok(FieldType::Struct(fields))
            }
            "char" | "varchar" => {
                self.skip_params()?;
                Ok(FieldType::Primitive(PrimitiveType::String))
            }
            other => {
                let p = PrimitiveType::from_name(other).ok_or_else(|| self.error(&format!("unknown type '{}'", other)))?;
                self.skip_params()?;
                Ok(FieldType::Primitive(p))
            }
        }
    }
}

/// One field of a catalog table definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    pub name: String,
    pub field_type: FieldType,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self { name: name.into(), field_type }
    }

    pub fn primitive(name: impl Into<String>, p: PrimitiveType) -> Self {
        Self::new(name, FieldType::Primitive(p))
    }

    /// Parse `type_str` with the catalog type grammar.
    pub fn parse(name: impl Into<String>, type_str: &str) -> BridgeResult<Self> {
        Ok(Self::new(name, type_str.parse()?))
    }

    pub fn type_string(&self) -> String { self.field_type.type_string() }

    pub fn is_complex(&self) -> bool { self.field_type.is_complex() }
}

/// Ordered field list; positions are ordinals for the lifetime of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSchema {
    fields: Vec<FieldSchema>,
}

impl TableSchema {
    pub fn new(fields: Vec<FieldSchema>) -> Self { Self { fields } }

    pub fn len(&self) -> usize { self.fields.len() }
    pub fn is_empty(&self) -> bool { self.fields.is_empty() }
    pub fn fields(&self) -> &[FieldSchema] { &self.fields }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// Ordinal of the first field whose name matches case-insensitively.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| same_ident(&f.name, name))
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.position(name).map(|i| &self.fields[i])
    }

    /// The trailing `count` fields.
    pub fn tail(&self, count: usize) -> TableSchema {
        let start = self.fields.len().saturating_sub(count);
        TableSchema::new(self.fields[start..].to_vec())
    }

    /// Reject field names that collide under case folding.
    pub fn ensure_unique_names(&self, table: &str) -> BridgeResult<()> {
        let mut seen = std::collections::HashSet::new();
        for f in &self.fields {
            if !seen.insert(canonical(&f.name)) {
                return Err(BridgeError::DuplicateCatalogField { table: table.to_string(), field: f.name.clone() });
            }
        }
        Ok(())
    }

    /// `(name, type string)` pairs for logs and configuration entries.
    pub fn describe(&self) -> Vec<(String, String)> {
        self.fields.iter().map(|f| (f.name.clone(), f.type_string())).collect()
    }
}

impl FromIterator<FieldSchema> for TableSchema {
    fn from_iter<I: IntoIterator<Item = FieldSchema>>(iter: I) -> Self {
        TableSchema::new(iter.into_iter().collect())
    }
}
