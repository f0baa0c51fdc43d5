//! External command execution for the catalog CLI.
//!
//! A generated script is written to the scratch directory and handed to the CLI
//! as `-f <script>`. The CLI runs either as a child process or, for tests and
//! embedded catalogs, as a registered entry point inside this process.

pub(crate) mod in_process;
mod process;

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::{BridgeOptions, ExecModeKind};
use crate::error::{BridgeError, BridgeResult};

pub use in_process::{exit_guard_installed, ExitGuard, ExitHandler, GuardedExit, IntendedExit, ProcessExit, ToolEntryPoint, ToolRegistry};
pub use process::{ProcessSettings, CATALOG_CLI_NAME};

const SCRIPT_PREFIX: &str = "catalog-script-";

#[derive(Debug, Clone)]
pub enum ExecMode {
    Process(ProcessSettings),
    InProcess { registry: ToolRegistry, tool: String },
}

#[derive(Debug, Clone)]
pub struct CommandExecutor {
    mode: ExecMode,
    scratch_dir: PathBuf,
}

impl CommandExecutor {
    pub fn new(mode: ExecMode, scratch_dir: impl Into<PathBuf>) -> Self {
        Self { mode, scratch_dir: scratch_dir.into() }
    }

    /// Executor for the mode the options select. `registry` is consulted only in
    /// in-process mode.
    pub fn from_options(opts: &BridgeOptions, registry: ToolRegistry) -> BridgeResult<Self> {
        let mode = match opts.exec_mode {
            ExecModeKind::Process => ExecMode::Process(
                ProcessSettings::for_catalog_home(&opts.catalog_home_or_default())
                    .with_timeout(opts.tool_timeout_secs.map(Duration::from_secs)),
            ),
            ExecModeKind::InProcess => {
                let tool = opts
                    .tool_name
                    .clone()
                    .ok_or_else(|| BridgeError::config("in_process exec mode requires tool_name"))?;
                ExecMode::InProcess { registry, tool }
            }
        };
        Ok(Self::new(mode, opts.scratch_dir()))
    }

    pub fn mode(&self) -> &ExecMode { &self.mode }

    pub fn scratch_dir(&self) -> &Path { &self.scratch_dir }

    /// Write `script` to a fresh file and run the catalog CLI on it.
    pub fn run(&self, script: &str) -> BridgeResult<()> {
        let path = self.write_script(script)?;
        let argv = vec!["-f".to_string(), path.display().to_string()];
        match &self.mode {
            ExecMode::Process(settings) => {
                info!(target: "catbridge::exec", "Executing external catalog CLI {} {:?}", settings.program.display(), argv);
                process::run(settings, &argv)
            }
            ExecMode::InProcess { registry, tool } => {
                info!(target: "catbridge::exec", "Executing catalog tool {} in process {:?}", tool, argv);
                in_process::run(registry, tool, &argv)
            }
        }
    }

    fn write_script(&self, script: &str) -> BridgeResult<PathBuf> {
        let name = format!(
            "{}{}-{}",
            SCRIPT_PREFIX,
            Utc::now().timestamp_millis(),
            &Uuid::new_v4().simple().to_string()[..8]
        );
        let path = self.scratch_dir.join(name);
        let written = std::fs::create_dir_all(&self.scratch_dir).and_then(|_| std::fs::write(&path, script));
        if let Err(e) = written {
            error!(target: "catbridge::exec", "Unable to write catalog script {}: {}", path.display(), e);
            return Err(e.into());
        }
        debug!(target: "catbridge::exec", "wrote catalog script {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct ReadScript;
    impl ToolEntryPoint for ReadScript {
        fn main(&self, argv: &[String], exit: &dyn ExitHandler) -> anyhow::Result<()> {
            anyhow::ensure!(argv.len() == 2 && argv[0] == "-f", "bad argv {:?}", argv);
            let text = std::fs::read_to_string(&argv[1])?;
            exit.exit(if text == "create table x (a int)" { 0 } else { 5 })
        }
    }

    fn in_process(dir: &Path) -> CommandExecutor {
        let registry = ToolRegistry::new().with("cli", Arc::new(ReadScript));
        CommandExecutor::new(ExecMode::InProcess { registry, tool: "cli".into() }, dir)
    }

    #[test]
    fn script_is_written_and_passed() {
        let tmp = tempfile::tempdir().unwrap();
        let scratch = tmp.path().join("nested");
        let exec = in_process(&scratch);
        exec.run("create table x (a int)").unwrap();
        assert_eq!(exec.run("other").unwrap_err().tool_exit_code(), Some(5));
        let names: Vec<String> = std::fs::read_dir(&scratch)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|n| n.starts_with(SCRIPT_PREFIX)));
    }

    #[test]
    fn from_options_selects_mode() {
        let mut opts = BridgeOptions::new("t");
        opts.catalog_home = Some(PathBuf::from("/opt/catalog"));
        opts.tool_timeout_secs = Some(30);
        let exec = CommandExecutor::from_options(&opts, ToolRegistry::new()).unwrap();
        match exec.mode() {
            ExecMode::Process(s) if cfg!(unix) => {
                assert_eq!(s.program, PathBuf::from("/opt/catalog/bin/hcat"));
                assert_eq!(s.timeout, Some(Duration::from_secs(30)));
            }
            ExecMode::Process(_) => {}
            other => panic!("unexpected {:?}", other),
        }

        opts.exec_mode = ExecModeKind::InProcess;
        assert!(CommandExecutor::from_options(&opts, ToolRegistry::new()).is_err());
        opts.tool_name = Some("cli".into());
        let exec = CommandExecutor::from_options(&opts, ToolRegistry::new()).unwrap();
        assert!(matches!(exec.mode(), ExecMode::InProcess { tool, .. } if tool == "cli"));
    }

    #[test]
    fn unwritable_scratch_dir_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let err = in_process(&blocker.join("sub")).run("s").unwrap_err();
        assert_eq!(err.code_str(), "io_error");
    }
}
