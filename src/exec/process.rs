use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::error::{BridgeError, BridgeResult};

pub const CATALOG_CLI_NAME: &str = if cfg!(windows) { "hcat.py" } else { "hcat" };

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How to launch the catalog CLI as a child process.
#[derive(Debug, Clone)]
pub struct ProcessSettings {
    pub program: PathBuf,
    pub leading_args: Vec<String>,
    /// Environment for the child; `None` inherits the current environment.
    pub env: Option<Vec<(String, String)>>,
    /// Unbounded when `None`.
    pub timeout: Option<Duration>,
}

impl ProcessSettings {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into(), leading_args: Vec::new(), env: None, timeout: None }
    }

    /// `<home>/bin/hcat`; on Windows the CLI is a python script.
    pub fn for_catalog_home(home: &Path) -> Self {
        let cli = home.join("bin").join(CATALOG_CLI_NAME);
        if cfg!(windows) {
            Self { leading_args: vec![cli.display().to_string()], ..Self::new("python") }
        } else {
            Self::new(cli)
        }
    }

    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = Some(env);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

pub(crate) fn run(settings: &ProcessSettings, argv: &[String]) -> BridgeResult<()> {
    ensure_launchable(&settings.program)?;
    let mut cmd = Command::new(&settings.program);
    cmd.args(&settings.leading_args)
        .args(argv)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(env) = &settings.env {
        cmd.env_clear().envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }
    let mut child = cmd
        .spawn()
        .map_err(|e| BridgeError::invocation(format!("cannot launch {}: {}", settings.program.display(), e)))?;

    // Drain both pipes while waiting so a chatty CLI cannot block on a full buffer
    let readers: Vec<JoinHandle<()>> = [
        child.stdout.take().map(|s| stream_to_log(s, "stdout")),
        child.stderr.take().map(|s| stream_to_log(s, "stderr")),
    ]
    .into_iter()
    .flatten()
    .collect();

    let status = wait(&mut child, settings.timeout)?;
    for r in readers {
        let _ = r.join();
    }
    match status.code() {
        Some(0) => Ok(()),
        Some(code) => Err(BridgeError::ExternalToolFailed { code }),
        None => {
            warn!(target: "catbridge::exec", "catalog CLI terminated by signal: {}", status);
            Err(BridgeError::ExternalToolFailed { code: -1 })
        }
    }
}

fn wait(child: &mut Child, timeout: Option<Duration>) -> BridgeResult<ExitStatus> {
    let Some(limit) = timeout else {
        return Ok(child.wait()?);
    };
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if start.elapsed() >= limit {
            warn!(target: "catbridge::exec", "catalog CLI exceeded {:?}; killing pid {}", limit, child.id());
            let _ = child.kill();
            let _ = child.wait();
            // reader threads are left to finish on their own; a grandchild may still hold the pipes
            return Err(BridgeError::ExternalToolTimedOut { secs: limit.as_secs() });
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn stream_to_log<R: Read + Send + 'static>(reader: R, stream: &'static str) -> JoinHandle<()> {
    thread::spawn(move || {
        for line in BufReader::new(reader).lines() {
            match line {
                Ok(l) => info!(target: "catbridge::exec", "[catalog-cli {}] {}", stream, l),
                Err(e) => {
                    warn!(target: "catbridge::exec", "[catalog-cli {}] read error: {}", stream, e);
                    break;
                }
            }
        }
    })
}

fn ensure_launchable(program: &Path) -> BridgeResult<()> {
    // bare names are resolved through PATH by the OS
    if program.components().count() > 1 && !is_executable(program) {
        return Err(BridgeError::invocation(format!("catalog CLI {} not found or not executable", program.display())));
    }
    Ok(())
}

#[cfg(unix)]
fn is_executable(p: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(p).map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0).unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(p: &Path) -> bool {
    p.is_file()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn script(dir: &Path, body: &str) -> PathBuf {
        let p = dir.join("bin").join(CATALOG_CLI_NAME);
        std::fs::create_dir_all(p.parent().unwrap()).unwrap();
        std::fs::write(&p, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&p, std::fs::Permissions::from_mode(0o755)).unwrap();
        p
    }

    #[test]
    fn zero_exit_succeeds() {
        let tmp = tempfile::tempdir().unwrap();
        script(tmp.path(), "echo \"ran with $1 $2\"; echo warn >&2; exit 0");
        let s = ProcessSettings::for_catalog_home(tmp.path());
        run(&s, &["-f".into(), "x".into()]).unwrap();
    }

    #[test]
    fn nonzero_exit_reports_code() {
        let tmp = tempfile::tempdir().unwrap();
        script(tmp.path(), "exit 3");
        let err = run(&ProcessSettings::for_catalog_home(tmp.path()), &[]).unwrap_err();
        assert_eq!(err.tool_exit_code(), Some(3));
    }

    #[test]
    fn environment_is_passed() {
        let tmp = tempfile::tempdir().unwrap();
        script(tmp.path(), "[ \"$CATBRIDGE_PROBE\" = yes ] || exit 9");
        let s = ProcessSettings::for_catalog_home(tmp.path())
            .with_env(vec![("CATBRIDGE_PROBE".into(), "yes".into()), ("PATH".into(), "/usr/bin:/bin".into())]);
        run(&s, &[]).unwrap();
        let s = ProcessSettings::for_catalog_home(tmp.path()).with_env(vec![]);
        assert_eq!(run(&s, &[]).unwrap_err().tool_exit_code(), Some(9));
    }

    #[test]
    fn missing_cli_is_invocation_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let err = run(&ProcessSettings::for_catalog_home(tmp.path()), &[]).unwrap_err();
        assert_eq!(err.code_str(), "tool_invocation_failed");
    }

    #[test]
    fn timeout_kills_child() {
        let tmp = tempfile::tempdir().unwrap();
        script(tmp.path(), "exec sleep 10");
        let s = ProcessSettings::for_catalog_home(tmp.path()).with_timeout(Some(Duration::from_millis(200)));
        let started = Instant::now();
        let err = run(&s, &[]).unwrap_err();
        assert_eq!(err.code_str(), "external_tool_timed_out");
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
