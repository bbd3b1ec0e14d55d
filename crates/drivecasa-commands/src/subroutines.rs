//! Helper functions pre-loaded into every tool session.
//!
//! These let later statements call small Python helpers, e.g. to read a
//! custom file format into native lists.

use serde::{Deserialize, Serialize};

/// A Python function definition loaded into the tool's namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subroutine {
    /// Name the definition binds.
    pub name: String,
    /// Full `def` source, newline-terminated.
    pub source: String,
}

impl Subroutine {
    /// Create a subroutine definition.
    #[must_use]
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

/// Name of the antenna-list loader.
pub const LOAD_ANTENNALIST: &str = "drivecasa_load_antennalist";

// Reads whitespace separated x, y, z, diameter columns; `#` rows are skipped.
const LOAD_ANTENNALIST_SOURCE: &str = "\
def drivecasa_load_antennalist(antennalist_path):
    with open(antennalist_path, 'r') as f:
        x = []
        y = []
        z = []
        d = []
        for l in f.readlines():
            items = l.split()
            if items and not items[0].startswith('#'):
                x.append(float(items[0]))
                y.append(float(items[1]))
                z.append(float(items[2]))
                d.append(float(items[3]))
    return x, y, z, d
";

/// The subroutines every session loads by default.
#[must_use]
pub fn builtin_subroutines() -> Vec<Subroutine> {
    vec![Subroutine::new(LOAD_ANTENNALIST, LOAD_ANTENNALIST_SOURCE)]
}
