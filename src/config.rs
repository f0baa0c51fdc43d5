//! Caller options for a configure pass.
//!
//! Options are plain serde structs so a job description can be loaded from JSON.
//! Unset paths fall back to `CATBRIDGE_*` environment variables.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{BridgeError, BridgeResult};

pub const ENV_CATALOG_HOME: &str = "CATBRIDGE_CATALOG_HOME";
pub const ENV_TMP_DIR: &str = "CATBRIDGE_TMP_DIR";
pub const ENV_DEBUG_IMPORT_MAPPER: &str = "CATBRIDGE_DEBUG_IMPORT_MAPPER";
pub const ENV_DEBUG_EXPORT_MAPPER: &str = "CATBRIDGE_DEBUG_EXPORT_MAPPER";

pub const DEFAULT_CATALOG_HOME: &str = "/usr/lib/hcatalog";
pub const DEFAULT_STORAGE_CLAUSE: &str = "stored as rcfile";

/// How the catalog CLI is launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecModeKind {
    /// Genuine child process (production).
    #[default]
    Process,
    /// Registered entry point run inside this process under an exit guard.
    InProcess,
}

/// Field/record delimiters a transfer writes; the import side replaces these
/// characters inside values when replacement is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelimiterSet {
    pub fields_terminated_by: char,
    pub lines_terminated_by: char,
    pub enclosed_by: char,
    pub escaped_by: char,
    #[serde(default)]
    pub enclose_required: bool,
}

impl DelimiterSet {
    /// Delimiters the catalog's text format uses by default. `\0` means "none".
    pub const CATALOG_DEFAULT: DelimiterSet = DelimiterSet {
        fields_terminated_by: '\u{1}',
        lines_terminated_by: '\n',
        enclosed_by: '\0',
        escaped_by: '\0',
        enclose_required: false,
    };

    /// Encoded form stored in the job configuration.
    pub fn to_codes(&self) -> [u32; 5] {
        [
            self.fields_terminated_by as u32,
            self.lines_terminated_by as u32,
            self.enclosed_by as u32,
            self.escaped_by as u32,
            u32::from(self.enclose_required),
        ]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeOptions {
    /// Catalog database; `default` when unset.
    pub catalog_database: Option<String>,
    /// Catalog table name. Required.
    pub catalog_table: String,
    /// Static partition key and its value for the whole job.
    pub partition_key: Option<String>,
    pub partition_value: Option<String>,
    /// Explicit database column subset.
    pub columns: Option<Vec<String>>,
    /// Column -> catalog type overrides (keys compare case-insensitively).
    pub type_overrides: BTreeMap<String, String>,
    pub storage_clause: Option<String>,
    pub create_table: bool,

    /// Stored procedure whose parameters are the columns, when no table is given.
    pub call: Option<String>,
    /// Free-form query whose result columns are the columns.
    pub query: Option<String>,

    pub catalog_home: Option<PathBuf>,
    /// Scratch directory for generated scripts.
    pub tmp_dir: Option<PathBuf>,
    pub skip_dist_cache: bool,

    pub exec_mode: ExecModeKind,
    /// Entry point name for in-process execution.
    pub tool_name: Option<String>,
    /// Kill the catalog CLI after this many seconds; unbounded when unset.
    pub tool_timeout_secs: Option<u64>,

    pub output_delimiters: Option<DelimiterSet>,
    pub drop_delims: bool,
    pub delims_replacement: Option<String>,

    pub debug_import_mapper: bool,
    pub debug_export_mapper: bool,
}

impl BridgeOptions {
    pub fn new(catalog_table: impl Into<String>) -> Self {
        Self { catalog_table: catalog_table.into(), ..Default::default() }
    }

    pub fn from_json_str(text: &str) -> BridgeResult<Self> {
        let opts: BridgeOptions = serde_json::from_str(text)
            .map_err(|e| BridgeError::config(format!("invalid options json: {}", e)))?;
        opts.validate()?;
        Ok(opts)
    }

    pub fn from_json_file(path: &Path) -> BridgeResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> BridgeResult<()> {
        if self.catalog_table.trim().is_empty() {
            return Err(BridgeError::config("catalog_table is required"));
        }
        if self.partition_key.is_some() != self.partition_value.is_some() {
            return Err(BridgeError::config("partition_key and partition_value must be supplied together"));
        }
        if self.exec_mode == ExecModeKind::InProcess && self.tool_name.is_none() {
            return Err(BridgeError::config("in_process exec mode requires tool_name"));
        }
        Ok(())
    }

    /// Fill unset paths and debug flags from the environment.
    pub fn with_env_defaults(mut self) -> Self {
        if !has_path(&self.catalog_home) {
            self.catalog_home = std::env::var_os(ENV_CATALOG_HOME).filter(|v| !v.is_empty()).map(PathBuf::from);
        }
        if self.catalog_home.is_none() {
            warn!(
                target: "catbridge::configure",
                "Catalog home is not set; job may fail if the catalog CLI is not found. Set {} or catalog_home. Using {}",
                ENV_CATALOG_HOME, DEFAULT_CATALOG_HOME
            );
            self.catalog_home = Some(PathBuf::from(DEFAULT_CATALOG_HOME));
        }
        if self.tmp_dir.is_none() {
            self.tmp_dir = std::env::var_os(ENV_TMP_DIR).map(PathBuf::from);
        }
        self.debug_import_mapper |= env_flag(ENV_DEBUG_IMPORT_MAPPER);
        self.debug_export_mapper |= env_flag(ENV_DEBUG_EXPORT_MAPPER);
        self
    }

    /// Catalog installation root, or the default location when unset.
    pub fn catalog_home_or_default(&self) -> PathBuf {
        match &self.catalog_home {
            Some(p) if !p.as_os_str().is_empty() => p.clone(),
            _ => PathBuf::from(DEFAULT_CATALOG_HOME),
        }
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.tmp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn storage_clause_or_default(&self) -> &str {
        self.storage_clause.as_deref().unwrap_or(DEFAULT_STORAGE_CLAUSE)
    }

    /// Delimiters to scrub from imported values.
    pub fn delimiters_to_replace(&self) -> DelimiterSet {
        self.output_delimiters.unwrap_or(DelimiterSet::CATALOG_DEFAULT)
    }

    pub fn delimiter_replacement_enabled(&self) -> bool {
        self.drop_delims || self.delims_replacement.is_some()
    }
}

fn has_path(p: &Option<PathBuf>) -> bool {
    p.as_ref().map(|p| !p.as_os_str().is_empty()).unwrap_or(false)
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_json() {
        let o = BridgeOptions::from_json_str(r#"{"catalog_table":"orders"}"#).unwrap();
        assert_eq!(o.catalog_table, "orders");
        assert_eq!(o.exec_mode, ExecModeKind::Process);
        assert!(o.type_overrides.is_empty());
        assert_eq!(o.storage_clause_or_default(), DEFAULT_STORAGE_CLAUSE);
    }

    #[test]
    fn parse_full_json() {
        let text = r#"{
            "catalog_database": "sales",
            "catalog_table": "orders",
            "partition_key": "dt",
            "partition_value": "2024-01-01",
            "columns": ["id", "amount"],
            "type_overrides": {"Amount": "decimal"},
            "exec_mode": "in_process",
            "tool_name": "catalog-cli",
            "output_delimiters": {"fields_terminated_by": ",", "lines_terminated_by": "\n", "enclosed_by": "\"", "escaped_by": "\\"}
        }"#;
        let o = BridgeOptions::from_json_str(text).unwrap();
        assert_eq!(o.exec_mode, ExecModeKind::InProcess);
        assert_eq!(o.type_overrides.get("Amount").map(String::as_str), Some("decimal"));
        let d = o.delimiters_to_replace();
        assert_eq!(d.to_codes(), [44, 10, 34, 92, 0]);
    }

    #[test]
    fn validation_errors() {
        assert!(BridgeOptions::from_json_str(r#"{}"#).is_err());
        assert!(BridgeOptions::from_json_str(r#"{"catalog_table":"t","partition_key":"dt"}"#).is_err());
        assert!(BridgeOptions::from_json_str(r#"{"catalog_table":"t","exec_mode":"in_process"}"#).is_err());
        assert!(BridgeOptions::from_json_str("not json").is_err());
    }

    #[test]
    fn default_delimiters_and_replacement_flag() {
        let mut o = BridgeOptions::new("t");
        assert_eq!(o.delimiters_to_replace().to_codes(), [1, 10, 0, 0, 0]);
        assert!(!o.delimiter_replacement_enabled());
        o.delims_replacement = Some(" ".into());
        assert!(o.delimiter_replacement_enabled());
        let o = BridgeOptions { drop_delims: true, ..BridgeOptions::new("t") };
        assert!(o.delimiter_replacement_enabled());
    }

    #[test]
    fn catalog_home_resolved_once() {
        let o = BridgeOptions::new("t");
        assert_eq!(o.catalog_home_or_default(), PathBuf::from(DEFAULT_CATALOG_HOME));
        assert!(o.catalog_home.is_none());

        let resolved = BridgeOptions::new("t").with_env_defaults();
        let expected = std::env::var_os(ENV_CATALOG_HOME)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CATALOG_HOME));
        assert_eq!(resolved.catalog_home.as_deref(), Some(expected.as_path()));

        let explicit = BridgeOptions { catalog_home: Some(PathBuf::from("/opt/cat")), ..BridgeOptions::new("t") };
        assert_eq!(explicit.with_env_defaults().catalog_home, Some(PathBuf::from("/opt/cat")));
    }
}
