//! In-process tool execution
//! -------------------------
//! Catalog tools assume they own the process and finish by exiting. Entry points
//! receive an `ExitHandler` instead of calling `std::process::exit` themselves:
//! production wiring hands them `ProcessExit`, the executor hands them a
//! `GuardedExit` that unwinds with an `IntendedExit` payload which is caught and
//! turned back into a status code.
//!
//! The guard is thread scoped (the entry point runs on the caller's thread) and
//! not re-entrant. An entry point that calls `exit` from a thread it spawned is
//! not covered.

use std::any::Any;
use std::cell::Cell;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Once};

use tracing::debug;

use crate::error::{BridgeError, BridgeResult};

thread_local! {
    static EXIT_GUARD: Cell<bool> = const { Cell::new(false) };
}

/// True while an `ExitGuard` is alive on the current thread.
pub fn exit_guard_installed() -> bool {
    EXIT_GUARD.with(|g| g.get())
}

/// Unwind payload carrying the status a guarded tool tried to exit with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntendedExit {
    pub code: i32,
}

pub trait ExitHandler {
    fn exit(&self, code: i32) -> !;
}

/// Terminates the process for real.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExit;

impl ExitHandler for ProcessExit {
    fn exit(&self, code: i32) -> ! {
        std::process::exit(code)
    }
}

/// Scoped exit interception. Installed on construction, removed on drop.
pub struct ExitGuard {
    _thread_bound: PhantomData<*const ()>,
}

impl ExitGuard {
    pub fn install() -> BridgeResult<Self> {
        if EXIT_GUARD.with(|g| g.replace(true)) {
            return Err(BridgeError::invocation("exit guard already installed on this thread"));
        }
        silence_intended_exits();
        debug!(target: "catbridge::exec", "exit guard installed");
        Ok(Self { _thread_bound: PhantomData })
    }

    pub fn handler(&self) -> GuardedExit<'_> {
        GuardedExit { _guard: self }
    }
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        EXIT_GUARD.with(|g| g.set(false));
        debug!(target: "catbridge::exec", "exit guard removed");
    }
}

/// Exit handler valid only while its guard lives.
pub struct GuardedExit<'g> {
    _guard: &'g ExitGuard,
}

impl ExitHandler for GuardedExit<'_> {
    fn exit(&self, code: i32) -> ! {
        panic::panic_any(IntendedExit { code })
    }
}

static QUIET_HOOK: Once = Once::new();

// Intended exits are control flow, not crashes; keep them out of stderr.
fn silence_intended_exits() {
    QUIET_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if info.payload().is::<IntendedExit>() {
                return;
            }
            previous(info);
        }));
    });
}

/// A catalog tool's `main`.
pub trait ToolEntryPoint: Send + Sync {
    fn main(&self, argv: &[String], exit: &dyn ExitHandler) -> anyhow::Result<()>;
}

/// Entry points available for in-process execution, fixed at startup.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn ToolEntryPoint>>,
}

impl ToolRegistry {
    pub fn new() -> Self { Self::default() }

    pub fn register(&mut self, name: impl Into<String>, tool: Arc<dyn ToolEntryPoint>) -> &mut Self {
        self.tools.insert(name.into(), tool);
        self
    }

    pub fn with(mut self, name: impl Into<String>, tool: Arc<dyn ToolEntryPoint>) -> Self {
        self.register(name, tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolEntryPoint>> {
        self.tools.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry").field("tools", &self.names()).finish()
    }
}

pub(crate) fn run(registry: &ToolRegistry, tool: &str, argv: &[String]) -> BridgeResult<()> {
    let entry = registry
        .get(tool)
        .ok_or_else(|| BridgeError::invocation(format!("catalog tool '{}' is not registered (known: {:?})", tool, registry.names())))?;
    let guard = ExitGuard::install()?;
    let outcome = {
        let handler = guard.handler();
        panic::catch_unwind(AssertUnwindSafe(|| entry.main(argv, &handler)))
    };
    drop(guard);
    interpret(tool, outcome)
}

fn interpret(tool: &str, outcome: std::thread::Result<anyhow::Result<()>>) -> BridgeResult<()> {
    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(BridgeError::invocation(format!("exception thrown from {}: {:#}", tool, e))),
        Err(payload) => match payload.downcast::<IntendedExit>() {
            Ok(exit) if exit.code == 0 => Ok(()),
            Ok(exit) => Err(BridgeError::ExternalToolFailed { code: exit.code }),
            Err(other) => Err(BridgeError::invocation(format!("{} panicked: {}", tool, panic_message(other.as_ref())))),
        },
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
