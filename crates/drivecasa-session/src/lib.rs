//! Interactive CASA session driver.
//!
//! Provides:
//! - `Session` - a live tool process driven through its prompt
//! - `RunOptions` / `Deadline` - strictness and timeouts per call
//! - `SeverityClassifier` - splitting replies into output and severe errors
//! - `CommandLog` - the audit log of submitted statements

pub mod audit;
pub mod classify;
pub mod driver;
pub mod error;
mod expect;
pub mod options;
pub mod retry;

#[cfg(test)]
mod testing;

pub use audit::CommandLog;
pub use classify::{ExecutionResult, SeverityClassifier};
pub use driver::Session;
pub use error::{SessionError, SevereCommand};
pub use options::{Deadline, RunOptions, SessionOptions};
pub use retry::RetryPolicy;
