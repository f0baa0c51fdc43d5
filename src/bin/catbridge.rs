//! catbridge binary
//! ----------------
//! Runs one configure pass from a JSON job file against in-memory database
//! metadata and an in-memory catalog, then prints the job configuration the
//! pass produced. Useful for checking a job description before submitting it.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use catbridge::catalog::{CatalogCli, InMemoryCatalog};
use catbridge::config::BridgeOptions;
use catbridge::db::{ColumnSource, MemoryDb};
use catbridge::exec::{CommandExecutor, ToolRegistry};
use catbridge::job::{JobConf, JobContext};
use catbridge::types::SqlTypeCode;
use catbridge::CatalogBridge;

const EMBEDDED_CLI: &str = "catalog-cli";

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} --job <job.json> [--import | --export] [--print-ddl]\n\nFlags:\n  --job <path>     Job description (options, database columns, catalog tables)\n  --import         Configure a database -> catalog transfer (default)\n  --export         Configure a catalog -> database transfer\n  --print-ddl      Print the CREATE TABLE statement when the pass created the table\n  -h, --help       Show this help\n\nIn-process execution uses the embedded catalog CLI registered as '{EMBEDDED_CLI}'.\nLogging follows RUST_LOG (default: info)."
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Direction {
    Import,
    Export,
}

#[derive(Debug, Deserialize)]
struct JobFile {
    options: BridgeOptions,
    #[serde(default)]
    direction: Option<Direction>,
    /// Database table the columns come from.
    #[serde(default)]
    db_table: Option<String>,
    /// Table name -> ordered (column, SQL type code) pairs.
    #[serde(default)]
    database: Vec<DbTable>,
    /// Statements applied to the catalog before the pass.
    #[serde(default)]
    catalog_ddl: Vec<String>,
    #[serde(default)]
    job_conf: std::collections::BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct DbTable {
    name: String,
    columns: Vec<(String, SqlTypeCode)>,
}

fn main() -> Result<()> {
    let mut args: Vec<String> = env::args().collect();
    let program = args.remove(0);

    let mut job_path: Option<PathBuf> = None;
    let mut direction: Option<Direction> = None;
    let mut print_ddl = false;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--job" => {
                if i + 1 >= args.len() { eprintln!("--job requires a path"); print_usage(&program); std::process::exit(2); }
                job_path = Some(PathBuf::from(&args[i + 1]));
                i += 2; continue;
            }
            "--import" => { direction = Some(Direction::Import); i += 1; continue; }
            "--export" => { direction = Some(Direction::Export); i += 1; continue; }
            "--print-ddl" => { print_ddl = true; i += 1; continue; }
            "-h" | "--help" => {
                print_usage(&program);
                return Ok(());
            }
            unk => {
                eprintln!("Unrecognized argument: {}", unk);
                print_usage(&program);
                std::process::exit(2);
            }
        }
    }
    let Some(job_path) = job_path else {
        print_usage(&program);
        std::process::exit(2);
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("invalid log filter")?;
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let text = fs::read_to_string(&job_path).with_context(|| format!("Failed to read job file {}", job_path.display()))?;
    let job_file: JobFile = serde_json::from_str(&text).with_context(|| format!("Invalid job file {}", job_path.display()))?;
    let direction = direction.or(job_file.direction).unwrap_or(Direction::Import);
    let opts = job_file.options.with_env_defaults();
    opts.validate()?;

    let mut db = MemoryDb::new();
    for t in job_file.database {
        db.add(ColumnSource::Table(t.name), t.columns);
    }

    let catalog = Arc::new(InMemoryCatalog::new());
    for stmt in &job_file.catalog_ddl {
        catalog.execute_ddl(stmt).with_context(|| format!("Failed to apply catalog statement: {}", stmt))?;
    }
    let registry = ToolRegistry::new().with(EMBEDDED_CLI, Arc::new(CatalogCli::new(catalog.clone())));
    let executor = CommandExecutor::from_options(&opts, registry)?;
    let bridge = CatalogBridge::new(catalog, executor);

    let mut conf = JobConf::new();
    for (k, v) in &job_file.job_conf {
        conf.set(k, v.as_str());
    }
    let mut job = JobContext::with_conf(conf);
    let table = job_file.db_table.as_deref();
    info!(target: "catbridge", "configuring {:?} job for catalog table {}", direction, opts.catalog_table);
    match direction {
        Direction::Import => bridge.configure_import(&opts, &mut job, &db, table)?,
        Direction::Export => bridge.configure_export(&opts, &mut job, &db, table)?,
    }

    if print_ddl {
        if let Some(ddl) = bridge.create_statement() {
            println!("{}\n", ddl);
        }
    }
    let report = serde_json::json!({
        "table": bridge.qualified_table_name(),
        "input_format": job.input_format(),
        "output_format": job.output_format(),
        "field_positions": bridge.field_positions(),
        "dynamic_partition_keys": bridge.dynamic_partition_keys(),
        "type_mismatches": bridge.type_mismatches(),
        "conf": job.conf.entries(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
