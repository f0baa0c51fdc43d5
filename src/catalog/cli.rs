use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};

use super::InMemoryCatalog;
use crate::exec::{ExitHandler, ToolEntryPoint};

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_USAGE: i32 = 64;

/// Catalog command line front end over an in-memory catalog.
///
/// Accepts `-f <script file>` or `-e <statements>` and exits with 0 when every
/// statement applied, 1 when one failed and 64 on bad usage.
#[derive(Debug, Clone)]
pub struct CatalogCli {
    catalog: Arc<InMemoryCatalog>,
}

impl CatalogCli {
    pub fn new(catalog: Arc<InMemoryCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Arc<InMemoryCatalog> { &self.catalog }
}

impl ToolEntryPoint for CatalogCli {
    fn main(&self, argv: &[String], exit: &dyn ExitHandler) -> anyhow::Result<()> {
        let script = match argv {
            [flag, path] if flag == "-f" => {
                std::fs::read_to_string(path).with_context(|| format!("reading script {}", path))?
            }
            [flag, stmt] if flag == "-e" => stmt.clone(),
            _ => {
                error!(target: "catbridge::catalog", "usage: catalog-cli (-f <file> | -e <statements>); got {:?}", argv);
                exit.exit(EXIT_USAGE)
            }
        };
        match self.catalog.execute_ddl(&script) {
            Ok(n) => {
                info!(target: "catbridge::catalog", "applied {} statement(s)", n);
                exit.exit(EXIT_OK)
            }
            Err(e) => {
                error!(target: "catbridge::catalog", "FAILED: {} [{}]", e, e.code_str());
                exit.exit(EXIT_FAILED)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogService;
    use crate::exec::{CommandExecutor, ExecMode, ToolRegistry};
    use crate::ident::QualifiedName;

    fn executor(dir: &std::path::Path, catalog: &Arc<InMemoryCatalog>) -> CommandExecutor {
        let registry = ToolRegistry::new().with("catalog-cli", Arc::new(CatalogCli::new(catalog.clone())));
        CommandExecutor::new(ExecMode::InProcess { registry, tool: "catalog-cli".into() }, dir)
    }

    #[test]
    fn script_creates_table() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = Arc::new(InMemoryCatalog::new());
        executor(tmp.path(), &catalog)
            .run("create table db.t (\n\ta string,\n\tb int)\nstored as rcfile")
            .unwrap();
        let schema = catalog.full_table_schema(&QualifiedName::new("db", "t")).unwrap();
        assert_eq!(schema.field_names(), vec!["a", "b"]);
    }

    #[test]
    fn failing_statement_exits_one() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = Arc::new(InMemoryCatalog::new());
        let exec = executor(tmp.path(), &catalog);
        exec.run("create table db.t (a int)").unwrap();
        let err = exec.run("create table db.t (a int)").unwrap_err();
        assert_eq!(err.tool_exit_code(), Some(EXIT_FAILED));
    }

    #[test]
    fn inline_statement_and_usage() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let registry = ToolRegistry::new().with("cli", Arc::new(CatalogCli::new(catalog.clone())));
        let exec = |argv: &[&str]| {
            let argv: Vec<String> = argv.iter().map(|s| s.to_string()).collect();
            crate::exec::in_process::run(&registry, "cli", &argv)
        };
        exec(&["-e", "create table t (a int)"]).unwrap();
        assert!(catalog.contains(&QualifiedName::new("default", "t")));
        assert_eq!(exec(&["-x"]).unwrap_err().tool_exit_code(), Some(EXIT_USAGE));
        let missing = exec(&["-f", "/nonexistent/catbridge/script"]).unwrap_err();
        assert_eq!(missing.code_str(), "tool_invocation_failed");
    }
}
