//! Application context threaded through a driving program.

use std::{collections::HashMap, path::PathBuf};

use serde_json::Value;

use crate::ShutdownRegistry;

/// Context owned by the top of a program that drives the tool.
///
/// Holds the working directory sessions are started in, free-form
/// metadata, and the handlers to run when the program winds down.
#[derive(Debug, Default)]
pub struct AppContext {
    /// Working directory for tool sessions.
    pub working_dir: PathBuf,

    /// Arbitrary metadata for app-specific needs.
    pub metadata: HashMap<String, Value>,

    /// Handlers run on shutdown.
    pub shutdown: ShutdownRegistry,
}

impl AppContext {
    /// Create a new context with just a working directory.
    #[must_use]
    pub fn new(working_dir: PathBuf) -> Self {
        Self {
            working_dir,
            metadata: HashMap::new(),
            shutdown: ShutdownRegistry::new(),
        }
    }

    /// Get a metadata value by key.
    #[must_use]
    pub fn get_metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Set a metadata value.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: Value) {
        self.metadata.insert(key.into(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_is_replaced_by_key() {
        let mut ctx = AppContext::new(PathBuf::from("/tmp/drivecasa"));
        ctx.set_metadata("group", Value::from("ami-la"));
        ctx.set_metadata("group", Value::from("ami-sa"));
        assert_eq!(ctx.get_metadata("group"), Some(&Value::from("ami-sa")));
        assert!(ctx.get_metadata("missing").is_none());
    }
}
