//! Core abstractions for driving an interactive CASA process.
//!
//! This crate provides the fundamental building blocks:
//! - `ToolSpawner` - the seam between the session driver and process launch
//! - `LaunchSpec` / `ToolProcess` - what goes in and what comes out of a launch
//! - `DriverConfig` - the TOML configuration model
//! - `AppContext` / `ShutdownRegistry` - explicit program-wide state

pub mod config;
pub mod context;
pub mod shutdown;
pub mod traits;

pub use config::{ConfigError, DriverConfig, ToolLogfile};
pub use context::AppContext;
pub use shutdown::ShutdownRegistry;
pub use traits::{
    LaunchSpec, ProcessError, ProcessHandle, ProcessKiller, ToolProcess, ToolSpawner,
};
