//! Core traits for launching and owning the tool process.

use std::{
    collections::BTreeMap,
    ffi::OsString,
    io::{self, Write},
    path::PathBuf,
};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Everything needed to start one tool process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Executable to run (bare name or path).
    pub program: PathBuf,
    /// Startup flags, in order.
    pub args: Vec<String>,
    /// Directory the tool is started in.
    pub cwd: PathBuf,
    /// Complete environment for the child. Nothing else is inherited.
    pub env: BTreeMap<OsString, OsString>,
}

impl LaunchSpec {
    /// Create a launch description with an empty environment.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            env: BTreeMap::new(),
        }
    }

    /// Append a flag.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Replace the environment.
    #[must_use]
    pub fn env(mut self, env: BTreeMap<OsString, OsString>) -> Self {
        self.env = env;
        self
    }

    /// The command line as a single string, for logging.
    #[must_use]
    pub fn display_command(&self) -> String {
        let program = self.program.to_string_lossy();
        let words =
            std::iter::once(program.as_ref()).chain(self.args.iter().map(String::as_str));
        shlex::try_join(words).unwrap_or_else(|_| self.args.join(" "))
    }
}

/// Detached handle that can kill a process from elsewhere.
pub trait ProcessKiller: Send + Sync {
    /// Kill the process. Killing an already-exited process is not an error.
    ///
    /// # Errors
    /// Returns error if the signal cannot be delivered.
    fn kill(&mut self) -> io::Result<()>;
}

/// Owned handle to a running tool process.
pub trait ProcessHandle: Send {
    /// OS process id, if known.
    fn pid(&self) -> Option<u32>;

    /// Whether the process has exited. Never blocks.
    fn has_exited(&mut self) -> bool;

    /// Kill the process.
    ///
    /// # Errors
    /// Returns error if the signal cannot be delivered.
    fn kill(&mut self) -> io::Result<()>;

    /// A killer that outlives borrows of this handle.
    fn killer(&self) -> Box<dyn ProcessKiller>;
}

/// A spawned tool process, split into its streams and its handle.
pub struct ToolProcess {
    /// Raw output chunks, in the order the tool wrote them. Closed on EOF.
    pub output: mpsc::UnboundedReceiver<Vec<u8>>,
    /// The tool's input stream.
    pub input: Box<dyn Write + Send>,
    /// Process handle.
    pub handle: Box<dyn ProcessHandle>,
}

impl std::fmt::Debug for ToolProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolProcess")
            .field("pid", &self.handle.pid())
            .finish_non_exhaustive()
    }
}

/// Process launch error.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),
    #[error("Executable not found: {0}")]
    ExecutableNotFound(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for tool launchers.
///
/// The real implementation runs the tool in a pseudo terminal; tests
/// substitute scripted in-memory processes.
#[async_trait]
pub trait ToolSpawner: Send + Sync {
    /// Start one tool process.
    async fn spawn(&self, launch: &LaunchSpec) -> Result<ToolProcess, ProcessError>;
}
