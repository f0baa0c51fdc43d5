//! Catalog bridge context
//! ----------------------
//! Owns one job's reconciliation against a catalog table. A configure pass runs
//! at most once per context: the first successful pass publishes its state,
//! later passes are ignored. Callers create one context per job and share it by
//! reference; nothing here is process global.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::catalog::{CatalogService, TableSchema};
use crate::config::BridgeOptions;
use crate::db::{ColumnSource, DbMetadata};
use crate::ddl::generate_create_table;
use crate::error::{BridgeError, BridgeResult};
use crate::exec::CommandExecutor;
use crate::ident::QualifiedName;
use crate::job::{keys, JobContext, DEFAULT_EXPORT_INPUT_FORMAT, DEFAULT_IMPORT_OUTPUT_FORMAT};
use crate::partition::{filter_map, filter_string, validate_dynamic_keys};
use crate::reconcile::{reconcile, ReconcileInput, Reconciliation, TypeMismatch};
use crate::registry::{ColumnRegistry, TypeOverrides};
use crate::types::{display_name, SqlTypeCode};

#[derive(Debug)]
struct BridgeState {
    table: QualifiedName,
    static_key: Option<String>,
    registry: ColumnRegistry,
    full_schema: TableSchema,
    reconciliation: Reconciliation,
    create_statement: Option<String>,
}

pub struct CatalogBridge {
    catalog: Arc<dyn CatalogService>,
    executor: CommandExecutor,
    injected_types: Option<Vec<(String, SqlTypeCode)>>,
    state: OnceCell<BridgeState>,
    configure_lock: Mutex<()>,
}

impl CatalogBridge {
    pub fn new(catalog: Arc<dyn CatalogService>, executor: CommandExecutor) -> Self {
        Self { catalog, executor, injected_types: None, state: OnceCell::new(), configure_lock: Mutex::new(()) }
    }

    /// Use these column names and types instead of asking the database.
    pub fn with_injected_types(mut self, columns: Vec<(String, SqlTypeCode)>) -> Self {
        self.injected_types = Some(columns);
        self
    }

    pub fn is_configured(&self) -> bool {
        self.state.get().is_some()
    }

    /// Reconcile the database columns with the catalog table and record the
    /// result in the job configuration. No-op once configured.
    pub fn configure(&self, opts: &BridgeOptions, job: &mut JobContext, db: &dyn DbMetadata, table: Option<&str>) -> BridgeResult<()> {
        self.configure_checked(opts, job, db, table, |_| Ok(())).map(|_| ())
    }

    /// Configure for a database -> catalog transfer: dynamic partition keys must
    /// come from database columns, and values are scrubbed of the delimiters the
    /// catalog's text format uses.
    pub fn configure_import(&self, opts: &BridgeOptions, job: &mut JobContext, db: &dyn DbMetadata, table: Option<&str>) -> BridgeResult<()> {
        info!(target: "catbridge::configure", "Configuring catalog for import job");
        if self.configure_checked(opts, job, db, table, check_dynamic_keys)?.is_none() {
            check_dynamic_keys(self.published()?)?;
        }
        let state = self.published()?;

        job.set_output_format(DEFAULT_IMPORT_OUTPUT_FORMAT);
        let delims = opts.delimiters_to_replace();
        debug!(target: "catbridge::configure", "Setting delimiter replacement information {:?}", delims);
        job.conf.store(keys::DELIMS_TO_REPLACE, &delims.to_codes())?;
        job.conf.set(keys::DELIMS_REPLACEMENT, opts.delims_replacement.clone().unwrap_or_default());
        job.conf.set_bool(keys::DELIMS_REPLACEMENT_ENABLED, opts.delimiter_replacement_enabled());
        job.conf.store(keys::FIELD_POSITIONS, &state.reconciliation.field_positions)?;
        Ok(())
    }

    /// Configure for a catalog -> database transfer: records each column's value
    /// type and SQL type code for the export tasks.
    pub fn configure_export(&self, opts: &BridgeOptions, job: &mut JobContext, db: &dyn DbMetadata, table: Option<&str>) -> BridgeResult<()> {
        info!(target: "catbridge::configure", "Configuring catalog for export job");
        let column_types = match self.configure_checked(opts, job, db, table, |s| export_column_types(s, db, table))? {
            Some(types) => types,
            None => export_column_types(self.published()?, db, table)?,
        };

        job.set_input_format(DEFAULT_EXPORT_INPUT_FORMAT);
        job.conf.store(keys::COLTYPES_VALUE, &column_types.value_types)?;
        job.conf.store(keys::COLTYPES_SQL, &column_types.sql_types)?;
        Ok(())
    }

    // Runs `check` on the candidate state before anything is published and
    // returns its output; `None` when the context was already configured.
    fn configure_checked<F, T>(&self, opts: &BridgeOptions, job: &mut JobContext, db: &dyn DbMetadata, table: Option<&str>, check: F) -> BridgeResult<Option<T>>
    where
        F: FnOnce(&BridgeState) -> BridgeResult<T>,
    {
        let _guard = self.configure_lock.lock();
        if self.state.get().is_some() {
            info!(target: "catbridge::configure", "Ignoring configuration request for catalog info");
            return Ok(None);
        }
        opts.validate()?;
        info!(target: "catbridge::configure", "Configuring catalog specific details for job");

        let state = self.build_state(opts, db, table)?;
        let checked = check(&state)?;

        self.catalog.set_schema(&state.table, &state.full_schema)?;
        write_job_entries(opts, job, &state)?;
        self.state
            .set(state)
            .map_err(|_| BridgeError::config("catalog bridge state published twice"))?;
        Ok(Some(checked))
    }

    fn build_state(&self, opts: &BridgeOptions, db: &dyn DbMetadata, table: Option<&str>) -> BridgeResult<BridgeState> {
        info!(target: "catbridge::configure", "Catalog home = {}", opts.catalog_home_or_default().display());
        let name = QualifiedName::from_options(opts.catalog_database.as_deref(), &opts.catalog_table);
        let static_key = opts.partition_key.clone();
        let overrides = TypeOverrides::from_map(&opts.type_overrides)?;

        let filter = match (&opts.partition_key, &opts.partition_value) {
            (Some(k), Some(v)) => {
                info!(target: "catbridge::configure", "Setting catalog input filter to {}", filter_string(k, v));
                Some(filter_map(k, v))
            }
            _ => None,
        };

        let source = ColumnSource::resolve(table, opts.call.as_deref(), opts.query.as_deref());
        let registry = ColumnRegistry::build(opts.columns.as_deref(), self.injected_types.as_deref(), source.as_ref(), db)?;

        let create_statement = if opts.create_table {
            info!(target: "catbridge::configure", "Creating catalog table {} for import", name);
            let ddl = generate_create_table(&name, &registry, &overrides, static_key.as_deref(), opts.storage_clause.as_deref(), db)?;
            self.executor.run(&ddl)?;
            Some(ddl)
        } else {
            None
        };

        let full_schema = self.catalog.full_table_schema(&name)?;
        let data_schema = self.catalog.data_schema(&name, filter.as_ref())?;
        let reconciliation = reconcile(&ReconcileInput {
            table: &name,
            registry: &registry,
            full_schema: &full_schema,
            data_field_count: data_schema.len(),
            overrides: &overrides,
            static_key: static_key.as_deref(),
            mapper: db,
        })?;

        Ok(BridgeState { table: name, static_key, registry, full_schema, reconciliation, create_statement })
    }

    fn published(&self) -> BridgeResult<&BridgeState> {
        self.state.get().ok_or_else(|| BridgeError::config("catalog bridge is not configured"))
    }

    pub fn projected_schema(&self) -> Option<&TableSchema> {
        self.state.get().map(|s| &s.reconciliation.projected)
    }

    pub fn partition_schema(&self) -> Option<&TableSchema> {
        self.state.get().map(|s| &s.reconciliation.partition)
    }

    pub fn full_schema(&self) -> Option<&TableSchema> {
        self.state.get().map(|s| &s.full_schema)
    }

    pub fn field_positions(&self) -> Option<&[usize]> {
        self.state.get().map(|s| s.reconciliation.field_positions.as_slice())
    }

    pub fn qualified_table_name(&self) -> Option<String> {
        self.state.get().map(|s| s.table.to_string())
    }

    pub fn dynamic_partition_keys(&self) -> Option<&[String]> {
        self.state.get().map(|s| s.reconciliation.dynamic_keys.as_slice())
    }

    pub fn static_partition_key(&self) -> Option<&str> {
        self.state.get().and_then(|s| s.static_key.as_deref())
    }

    pub fn db_column_names(&self) -> Option<&[String]> {
        self.state.get().map(|s| s.registry.names())
    }

    pub fn db_column_types(&self) -> Option<&HashMap<String, SqlTypeCode>> {
        self.state.get().map(|s| s.registry.types())
    }

    pub fn type_mismatches(&self) -> Option<&[TypeMismatch]> {
        self.state.get().map(|s| s.reconciliation.type_mismatches.as_slice())
    }

    /// DDL the configure pass ran, when it created the table.
    pub fn create_statement(&self) -> Option<&str> {
        self.state.get().and_then(|s| s.create_statement.as_deref())
    }
}

fn check_dynamic_keys(state: &BridgeState) -> BridgeResult<()> {
    info!(target: "catbridge::configure", "Validating dynamic partition keys");
    validate_dynamic_keys(&state.reconciliation.dynamic_keys, state.registry.names())
}

struct ExportColumnTypes {
    value_types: BTreeMap<String, String>,
    sql_types: BTreeMap<String, SqlTypeCode>,
}

fn export_column_types(state: &BridgeState, db: &dyn DbMetadata, table: Option<&str>) -> BridgeResult<ExportColumnTypes> {
    let mut value_types = BTreeMap::new();
    let mut sql_types = BTreeMap::new();
    for (col, code) in state.registry.types() {
        let value_type = db
            .value_type_name(table, col, *code)
            .ok_or_else(|| BridgeError::UnsupportedType { column: col.clone(), type_name: display_name(*code).to_string() })?;
        value_types.insert(col.clone(), value_type);
        sql_types.insert(col.clone(), *code);
    }
    Ok(ExportColumnTypes { value_types, sql_types })
}

fn write_job_entries(opts: &BridgeOptions, job: &mut JobContext, state: &BridgeState) -> BridgeResult<()> {
    job.conf.set(keys::STATIC_PARTITION_KEY, state.static_key.clone().unwrap_or_default());
    job.conf.store(keys::OUTPUT_SCHEMA, &state.full_schema.describe())?;
    if job.is_local() {
        info!(target: "catbridge::configure", "Not adding catalog libraries to distributed cache in local mode");
    } else if opts.skip_dist_cache {
        info!(target: "catbridge::configure", "Not adding catalog libraries to distributed cache as requested");
    }
    job.conf.set_bool(keys::SKIP_DIST_CACHE, opts.skip_dist_cache);
    job.conf.set_bool(keys::DEBUG_IMPORT_MAPPER, opts.debug_import_mapper);
    job.conf.set_bool(keys::DEBUG_EXPORT_MAPPER, opts.debug_export_mapper);
    Ok(())
}
