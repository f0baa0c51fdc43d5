//! Database column registry
//! ------------------------
//! Case-folded database column names and their SQL type codes, built once per
//! configure pass. Names come from the caller's explicit column list, an injected
//! type map, or the database capability, in that order.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::info;

use crate::db::{ColumnSource, DbMetadata};
use crate::error::{BridgeError, BridgeResult};
use crate::ident::canonical;
use crate::tprintln;
use crate::types::SqlTypeCode;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnRegistry {
    names: Vec<String>,
    types: HashMap<String, SqlTypeCode>,
}

impl ColumnRegistry {
    pub fn build(
        explicit: Option<&[String]>,
        injected: Option<&[(String, SqlTypeCode)]>,
        source: Option<&ColumnSource>,
        db: &dyn DbMetadata,
    ) -> BridgeResult<Self> {
        let raw_names: Vec<String> = match (explicit, injected, source) {
            (Some(cols), _, _) => cols.to_vec(),
            (None, Some(inj), _) => inj.iter().map(|(n, _)| n.clone()).collect(),
            (None, None, Some(src)) => db.column_names(src)?,
            (None, None, None) => return Err(BridgeError::NoColumnSource),
        };
        let names = fold_unique(raw_names)?;

        let discovered: HashMap<String, SqlTypeCode> = match injected {
            Some(inj) => inj.iter().map(|(n, t)| (canonical(n), *t)).collect(),
            None => {
                let src = source.ok_or(BridgeError::NoColumnSource)?;
                db.column_types(src)?.into_iter().map(|(n, t)| (canonical(&n), t)).collect()
            }
        };
        tprintln!("[REGISTRY] discovered types={:?}", discovered);

        let types = if explicit.is_some() {
            // prune to the projection
            let mut pruned = HashMap::with_capacity(names.len());
            for col in &names {
                let t = discovered.get(col).copied().ok_or_else(|| BridgeError::ColumnNotFound { column: col.clone() })?;
                pruned.insert(col.clone(), t);
            }
            pruned
        } else {
            discovered
        };

        info!(target: "catbridge::configure", "Database column names projected : {:?}", names);
        info!(target: "catbridge::configure", "Database column name - type map : {:?}", names.iter().map(|n| (n.as_str(), types.get(n))).collect::<Vec<_>>());
        Ok(Self { names, types })
    }

    /// Registry from literal `(name, type)` pairs, in order.
    pub fn from_columns<S: AsRef<str>>(columns: &[(S, SqlTypeCode)]) -> BridgeResult<Self> {
        let names = fold_unique(columns.iter().map(|(n, _)| n.as_ref().to_string()).collect())?;
        let types = columns.iter().map(|(n, t)| (canonical(n.as_ref()), *t)).collect();
        Ok(Self { names, types })
    }

    pub fn names(&self) -> &[String] { &self.names }

    pub fn types(&self) -> &HashMap<String, SqlTypeCode> { &self.types }

    pub fn type_of(&self, name: &str) -> Option<SqlTypeCode> {
        self.types.get(&canonical(name)).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        let c = canonical(name);
        self.names.iter().any(|n| *n == c)
    }
}

fn fold_unique(raw: Vec<String>) -> BridgeResult<Vec<String>> {
    let mut seen = HashSet::with_capacity(raw.len());
    let mut out = Vec::with_capacity(raw.len());
    for name in raw {
        let folded = canonical(&name);
        if !seen.insert(folded.clone()) {
            return Err(BridgeError::DuplicateColumn { column: folded });
        }
        out.push(folded);
    }
    Ok(out)
}

/// User supplied column -> catalog type overrides with canonical keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeOverrides {
    map: BTreeMap<String, String>,
}

impl TypeOverrides {
    pub fn from_map(raw: &BTreeMap<String, String>) -> BridgeResult<Self> {
        let mut map = BTreeMap::new();
        for (k, v) in raw {
            let key = canonical(k);
            if map.insert(key.clone(), v.trim().to_string()).is_some() {
                return Err(BridgeError::DuplicateColumn { column: key });
            }
        }
        Ok(Self { map })
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.map.get(&canonical(column)).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool { self.map.is_empty() }

    /// Every override must name a known database column.
    pub fn ensure_known(&self, registry: &ColumnRegistry) -> BridgeResult<()> {
        for key in self.map.keys() {
            if !registry.contains(key) {
                return Err(BridgeError::UnknownOverrideColumn { column: key.clone() });
            }
        }
        Ok(())
    }
}
