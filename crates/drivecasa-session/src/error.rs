//! Session error types.

use std::{fmt, path::PathBuf, time::Duration};

use drivecasa_commands::StatementError;
use thiserror::Error;

/// Session driver error.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Invalid options, or the audit log path is already taken.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// The tool could not be started or never showed its prompt.
    #[error("Failed to start tool: {0}")]
    Spawn(String),
    /// No prompt within the timeout. The session stays open but is not ready.
    #[error("Timed out after {elapsed:?} waiting for `{statement}`")]
    CommandTimeout { statement: String, elapsed: Duration },
    /// A strict call produced severe diagnostics.
    #[error(transparent)]
    SevereCommand(Box<SevereCommand>),
    /// The tool closed its output while a prompt was awaited.
    #[error("Tool exited unexpectedly")]
    ProcessExited { output: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid statement: {0}")]
    Statement(#[from] StatementError),
}

/// Details of a strict call that produced severe diagnostics.
///
/// `output` and `errors` accumulate over every command submitted by the
/// failing call, up to and including the offending one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SevereCommand {
    /// The offending command; `None` when a script file was run directly.
    pub command: Option<String>,
    /// Script file executed by the tool.
    pub script: PathBuf,
    pub output: Vec<String>,
    pub errors: Vec<String>,
}

impl fmt::Display for SevereCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.command {
            Some(command) => write!(f, "Severe error running command `{command}`")?,
            None => write!(f, "Severe error running script {}", self.script.display())?,
        }
        for line in &self.errors {
            write!(f, "\n  {line}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SevereCommand {}

impl SessionError {
    /// Severe-command details, if this is that variant.
    #[must_use]
    pub fn as_severe(&self) -> Option<&SevereCommand> {
        match self {
            Self::SevereCommand(severe) => Some(severe),
            _ => None,
        }
    }
}
