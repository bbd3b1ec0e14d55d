//! Driver configuration file.
//!
//! A TOML document with four optional sections:
//!
//! ```toml
//! [tool]
//! install_dir = "/opt/casa-release-4.7"
//! prompt = 'In \[[0-9]+\]:'
//! logfile = "none"          # "default", "none", or a path
//! log2term = true
//! extra_args = ["--drivecasa"]
//!
//! [session]
//! working_dir = "/tmp/drivecasa"
//! timeout_secs = 600
//! echo = false
//! commands_log = "/data/run/commands.log"
//!
//! [retry]
//! max_attempts = 3
//! startup_timeout_secs = 60
//!
//! [severity]
//! delimiter = "\t"
//! field = 1
//! marker = "SEVERE"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prompt shown by the tool's interactive shell in driven mode.
pub const DEFAULT_PROMPT: &str = r"In \[[0-9]+\]:";
/// Per-command timeout.
pub const DEFAULT_TIMEOUT_SECS: f64 = 600.0;
/// Spawn attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Time allowed for the first prompt on each attempt.
pub const DEFAULT_STARTUP_TIMEOUT_SECS: f64 = 60.0;
/// Tag the tool's logger puts in the second field of serious diagnostics.
pub const SEVERITY_MARKER: &str = "SEVERE";

/// Default working directory, `<tmp>/drivecasa`.
#[must_use]
pub fn default_working_dir() -> PathBuf {
    std::env::temp_dir().join("drivecasa")
}

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// What the tool does with its own logfile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ToolLogfile {
    /// Tool default: a timestamped log in its working directory.
    #[default]
    Default,
    /// No logfile.
    Disabled,
    /// Log to this path.
    Path(PathBuf),
}

impl From<String> for ToolLogfile {
    fn from(value: String) -> Self {
        match value.as_str() {
            "default" | "" => Self::Default,
            "none" => Self::Disabled,
            _ => Self::Path(PathBuf::from(value)),
        }
    }
}

impl From<ToolLogfile> for String {
    fn from(value: ToolLogfile) -> Self {
        match value {
            ToolLogfile::Default => "default".into(),
            ToolLogfile::Disabled => "none".into(),
            ToolLogfile::Path(p) => p.to_string_lossy().into_owned(),
        }
    }
}

/// `[tool]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolSection {
    /// Top-level CASA install directory. `None` uses `$PATH`.
    pub install_dir: Option<PathBuf>,
    /// Prompt regex.
    pub prompt: String,
    /// Tool logfile handling.
    pub logfile: ToolLogfile,
    /// Echo log messages into the interactive stream.
    pub log2term: bool,
    /// Flags appended after the fixed startup flags.
    pub extra_args: Vec<String>,
}

impl Default for ToolSection {
    fn default() -> Self {
        Self {
            install_dir: None,
            prompt: DEFAULT_PROMPT.to_string(),
            logfile: ToolLogfile::Default,
            log2term: true,
            extra_args: Vec::new(),
        }
    }
}

/// `[session]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionSection {
    pub working_dir: PathBuf,
    /// Per-command timeout; `None` waits forever.
    pub timeout_secs: Option<f64>,
    /// Tee all tool output to stdout.
    pub echo: bool,
    /// Audit log of submitted statements. Must not exist yet.
    pub commands_log: Option<PathBuf>,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            working_dir: default_working_dir(),
            timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
            echo: false,
            commands_log: None,
        }
    }
}

/// `[retry]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub startup_timeout_secs: f64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            startup_timeout_secs: DEFAULT_STARTUP_TIMEOUT_SECS,
        }
    }
}

/// `[severity]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SeveritySection {
    pub delimiter: char,
    /// Zero-based field index holding the marker.
    pub field: usize,
    pub marker: String,
}

impl Default for SeveritySection {
    fn default() -> Self {
        Self {
            delimiter: '\t',
            field: 1,
            marker: SEVERITY_MARKER.to_string(),
        }
    }
}

/// Whole configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverConfig {
    pub tool: ToolSection,
    pub session: SessionSection,
    pub retry: RetrySection,
    pub severity: SeveritySection,
}

impl DriverConfig {
    /// Load from a TOML file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Loaded driver config");
        Ok(config)
    }

    /// Parse a TOML document.
    ///
    /// # Errors
    /// Returns error on malformed TOML or unknown keys.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = DriverConfig::from_toml_str("").unwrap();
        assert_eq!(config, DriverConfig::default());
        assert_eq!(config.tool.prompt, DEFAULT_PROMPT);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.severity.delimiter, '\t');
        assert_eq!(config.session.timeout_secs, Some(600.0));
    }

    #[test]
    fn sections_override_selectively() {
        let config = DriverConfig::from_toml_str(
            r#"
            [tool]
            install_dir = "/opt/casa"
            prompt = 'CASA <[0-9]+>:'
            logfile = "none"

            [severity]
            delimiter = "|"
            field = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.tool.install_dir, Some(PathBuf::from("/opt/casa")));
        assert_eq!(config.tool.prompt, "CASA <[0-9]+>:");
        assert_eq!(config.tool.logfile, ToolLogfile::Disabled);
        assert!(config.tool.log2term);
        assert_eq!(config.severity.delimiter, '|');
        assert_eq!(config.severity.field, 2);
        assert_eq!(config.severity.marker, "SEVERE");
    }

    #[test]
    fn logfile_path_is_kept() {
        let config = DriverConfig::from_toml_str("[tool]\nlogfile = \"casa.log\"\n").unwrap();
        assert_eq!(
            config.tool.logfile,
            ToolLogfile::Path(PathBuf::from("casa.log"))
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(DriverConfig::from_toml_str("[retry]\nattempts = 4\n").is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = DriverConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
