//! Job framework surface: the mutable configuration bag the engine writes its
//! results into, and the input/output access formats it selects.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{BridgeError, BridgeResult};

/// Configuration keys written by the engine.
pub mod keys {
    pub const FIELD_POSITIONS: &str = "catbridge.field.positions";
    pub const STATIC_PARTITION_KEY: &str = "catbridge.partition.key";
    pub const DELIMS_TO_REPLACE: &str = "catbridge.delims.to.replace";
    pub const DELIMS_REPLACEMENT: &str = "catbridge.delims.replacement";
    pub const DELIMS_REPLACEMENT_ENABLED: &str = "catbridge.delims.replacement.enabled";
    pub const COLTYPES_VALUE: &str = "catbridge.db.output.coltypes.value";
    pub const COLTYPES_SQL: &str = "catbridge.db.output.coltypes.sql";
    pub const DEBUG_IMPORT_MAPPER: &str = "catbridge.debug.import.mapper";
    pub const DEBUG_EXPORT_MAPPER: &str = "catbridge.debug.export.mapper";
    pub const SKIP_DIST_CACHE: &str = "catbridge.skip.dist.cache";
    pub const OUTPUT_SCHEMA: &str = "catbridge.output.schema";
    pub const FRAMEWORK_NAME: &str = "catbridge.framework.name";
    pub const JOB_TRACKER: &str = "catbridge.job.tracker";
}

pub const DEFAULT_IMPORT_OUTPUT_FORMAT: &str = "catalog_output";
pub const DEFAULT_EXPORT_INPUT_FORMAT: &str = "catalog_export_input";

/// String-to-string configuration bag; structured values are stored as JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobConf {
    entries: BTreeMap<String, String>,
}

impl JobConf {
    pub fn new() -> Self { Self::default() }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.entries.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.set(key, if value { "true" } else { "false" });
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).map(|v| v.eq_ignore_ascii_case("true")).unwrap_or(false)
    }

    pub fn store<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> BridgeResult<()> {
        let text = serde_json::to_string(value)
            .map_err(|e| BridgeError::config(format!("cannot encode {}: {}", key, e)))?;
        self.set(key, text);
        Ok(())
    }

    pub fn load<T: DeserializeOwned>(&self, key: &str) -> BridgeResult<Option<T>> {
        match self.get(key) {
            None => Ok(None),
            Some(text) => serde_json::from_str(text)
                .map(Some)
                .map_err(|e| BridgeError::config(format!("cannot decode {}: {}", key, e))),
        }
    }

    pub fn entries(&self) -> &BTreeMap<String, String> { &self.entries }
}

/// Handle on the job being configured.
#[derive(Debug, Clone, Default)]
pub struct JobContext {
    pub conf: JobConf,
    input_format: Option<String>,
    output_format: Option<String>,
}

impl JobContext {
    pub fn new() -> Self { Self::default() }

    pub fn with_conf(conf: JobConf) -> Self {
        Self { conf, ..Default::default() }
    }

    pub fn set_input_format(&mut self, name: impl Into<String>) { self.input_format = Some(name.into()); }
    pub fn set_output_format(&mut self, name: impl Into<String>) { self.output_format = Some(name.into()); }
    pub fn input_format(&self) -> Option<&str> { self.input_format.as_deref() }
    pub fn output_format(&self) -> Option<&str> { self.output_format.as_deref() }

    /// True when the job runs on the local single-process runner.
    pub fn is_local(&self) -> bool {
        if self.conf.get(keys::FRAMEWORK_NAME).map(|v| v.eq_ignore_ascii_case("yarn")).unwrap_or(false) {
            return false;
        }
        self.conf.get(keys::JOB_TRACKER) == Some("local")
    }
}
