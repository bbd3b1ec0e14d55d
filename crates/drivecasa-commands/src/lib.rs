//! Typed CASA statements and data-reduction script composers.
//!
//! Provides:
//! - `Statement` / `Literal` - structured calls rendered to Python on display
//! - Helper subroutines pre-loaded into sessions
//! - Reduction composers (`import_uvfits`, `clean`, ...)
//! - Simulation composers (`open_sim`, `setconfig`, `observe`, ...)
//! - Mask and measure formatters, output path derivation

pub mod format;
pub mod paths;
pub mod reduction;
pub mod simulation;
pub mod statement;
pub mod subroutines;

pub use paths::{Derivation, PathError, derive_out_path, ensure_dir, save_script};
pub use reduction::{CleanMaps, CleanParams, OutputTarget};
pub use simulation::{PointSource, SpectralWindow};
pub use statement::{Literal, Statement, StatementError};
pub use subroutines::{Subroutine, builtin_subroutines};

/// The statement asking the tool to run a script file.
#[must_use]
pub fn execfile(path: &std::path::Path) -> Statement {
    Statement::call("execfile").arg(path)
}
