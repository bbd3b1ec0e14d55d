//! PTY launcher and environment assembly for CASA.
//!
//! Provides:
//! - `PtySpawner` - the real `ToolSpawner`, running the tool on a pseudo terminal
//! - Environment helpers that put a CASA install on the search paths

pub mod env;
pub mod spawner;

pub use env::{prepend_search_path, resolve_executable_path, tool_env, tool_program};
pub use spawner::PtySpawner;
