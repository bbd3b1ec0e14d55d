//! Options for opening a session and for individual calls.

use std::{path::PathBuf, time::Duration};

use drivecasa_commands::{Subroutine, builtin_subroutines};
use drivecasa_core::{
    DriverConfig, LaunchSpec, ToolLogfile,
    config::{DEFAULT_PROMPT, DEFAULT_TIMEOUT_SECS, default_working_dir},
};
use drivecasa_pty::{tool_env, tool_program};

use crate::{classify::SeverityClassifier, error::SessionError, retry::RetryPolicy};

/// Fixed startup flags: no logger window, no GUI, no colour escapes.
const STARTUP_FLAGS: [&str; 3] = ["--nologger", "--nogui", "--colors=NoColor"];

/// How to open a [`Session`](crate::Session).
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Top-level CASA install. `None` runs `casa` from `$PATH`.
    pub install_dir: Option<PathBuf>,
    /// Launch this program instead of the install's `casa`.
    pub program: Option<PathBuf>,
    /// Created if missing; the tool runs here.
    pub working_dir: PathBuf,
    pub tool_logfile: ToolLogfile,
    pub log2term: bool,
    pub extra_args: Vec<String>,
    /// Audit log of submitted statements. Must not exist yet.
    pub commands_log: Option<PathBuf>,
    /// Per-command timeout; `None` waits forever.
    pub timeout: Option<Duration>,
    /// Tee all tool output to stdout.
    pub echo_to_stdout: bool,
    /// Prompt regex.
    pub prompt: String,
    pub retry: RetryPolicy,
    pub severity: SeverityClassifier,
    /// Helper definitions executed right after startup, in order.
    pub subroutines: Vec<Subroutine>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            install_dir: None,
            program: None,
            working_dir: default_working_dir(),
            tool_logfile: ToolLogfile::Default,
            log2term: true,
            extra_args: Vec::new(),
            commands_log: None,
            timeout: Some(Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS)),
            echo_to_stdout: false,
            prompt: DEFAULT_PROMPT.to_string(),
            retry: RetryPolicy::default(),
            severity: SeverityClassifier::default(),
            subroutines: builtin_subroutines(),
        }
    }
}

impl SessionOptions {
    /// Options from a loaded configuration.
    ///
    /// # Errors
    /// Returns [`SessionError::Configuration`] for negative or non-finite
    /// durations.
    pub fn from_config(config: &DriverConfig) -> Result<Self, SessionError> {
        let timeout = config
            .session
            .timeout_secs
            .map(|secs| seconds("session.timeout_secs", secs))
            .transpose()?;
        Ok(Self {
            install_dir: config.tool.install_dir.clone(),
            program: None,
            working_dir: config.session.working_dir.clone(),
            tool_logfile: config.tool.logfile.clone(),
            log2term: config.tool.log2term,
            extra_args: config.tool.extra_args.clone(),
            commands_log: config.session.commands_log.clone(),
            timeout,
            echo_to_stdout: config.session.echo,
            prompt: config.tool.prompt.clone(),
            retry: RetryPolicy::new(
                config.retry.max_attempts,
                seconds("retry.startup_timeout_secs", config.retry.startup_timeout_secs)?,
            ),
            severity: SeverityClassifier::from(&config.severity),
            subroutines: builtin_subroutines(),
        })
    }

    /// The launch line and environment for these options.
    #[must_use]
    pub fn launch_spec(&self) -> LaunchSpec {
        let program = self
            .program
            .clone()
            .unwrap_or_else(|| tool_program(self.install_dir.as_deref()));

        let mut launch = LaunchSpec::new(program, self.working_dir.clone());
        for flag in STARTUP_FLAGS {
            launch = launch.arg(flag);
        }
        match &self.tool_logfile {
            ToolLogfile::Default => {}
            ToolLogfile::Disabled => launch = launch.arg("--nologfile"),
            ToolLogfile::Path(path) => {
                let path = std::path::absolute(path).unwrap_or_else(|_| path.clone());
                launch = launch
                    .arg("--logfile")
                    .arg(path.to_string_lossy().into_owned());
            }
        }
        if self.log2term {
            launch = launch.arg("--log2term");
        }
        for extra in &self.extra_args {
            launch = launch.arg(extra.clone());
        }
        launch.env(tool_env(self.install_dir.as_deref()))
    }
}

fn seconds(field: &str, secs: f64) -> Result<Duration, SessionError> {
    Duration::try_from_secs_f64(secs)
        .map_err(|e| SessionError::Configuration(format!("{field}: {e}")))
}

/// How long a single call may wait for the prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Deadline {
    /// Use the session's timeout.
    #[default]
    SessionDefault,
    After(Duration),
    /// Wait indefinitely.
    Unbounded,
}

impl Deadline {
    #[must_use]
    pub const fn resolve(self, session_default: Option<Duration>) -> Option<Duration> {
        match self {
            Self::SessionDefault => session_default,
            Self::After(timeout) => Some(timeout),
            Self::Unbounded => None,
        }
    }
}

/// Per-call options for [`Session::run_commands`](crate::Session::run_commands)
/// and [`Session::run_script_file`](crate::Session::run_script_file).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Fail on the first severe diagnostic instead of collecting them.
    pub strict: bool,
    pub deadline: Deadline,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            strict: true,
            deadline: Deadline::SessionDefault,
        }
    }
}

impl RunOptions {
    /// Strict, with the session timeout.
    #[must_use]
    pub fn strict() -> Self {
        Self::default()
    }

    /// Collect severe diagnostics instead of failing.
    #[must_use]
    pub fn lenient() -> Self {
        Self {
            strict: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    #[must_use]
    pub const fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Deadline::After(timeout))
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn launch_flags_in_order() {
        let options = SessionOptions {
            program: Some(PathBuf::from("/opt/casa/bin/casa")),
            working_dir: PathBuf::from("/tmp/work"),
            tool_logfile: ToolLogfile::Path(PathBuf::from("/tmp/work/casa.log")),
            extra_args: vec!["--drivecasa".into()],
            ..SessionOptions::default()
        };
        let launch = options.launch_spec();
        assert_eq!(launch.program, Path::new("/opt/casa/bin/casa"));
        assert_eq!(launch.cwd, Path::new("/tmp/work"));
        assert_eq!(
            launch.args,
            vec![
                "--nologger",
                "--nogui",
                "--colors=NoColor",
                "--logfile",
                "/tmp/work/casa.log",
                "--log2term",
                "--drivecasa",
            ]
        );
    }

    #[test]
    fn disabled_logfile_and_quiet_terminal() {
        let options = SessionOptions {
            tool_logfile: ToolLogfile::Disabled,
            log2term: false,
            ..SessionOptions::default()
        };
        let launch = options.launch_spec();
        assert_eq!(
            launch.args,
            vec!["--nologger", "--nogui", "--colors=NoColor", "--nologfile"]
        );
        assert_eq!(launch.program, Path::new("casa"));
    }

    #[test]
    fn install_dir_reaches_program_and_env() {
        let options = SessionOptions {
            install_dir: Some(PathBuf::from("/opt/casa-4.7")),
            ..SessionOptions::default()
        };
        let launch = options.launch_spec();
        assert_eq!(launch.program, Path::new("/opt/casa-4.7/bin/casa"));
        let path = launch.env.get(std::ffi::OsStr::new("PATH")).unwrap();
        assert!(path.to_string_lossy().starts_with("/opt/casa-4.7/bin"));
    }

    #[test]
    fn from_config_maps_sections() {
        let config = DriverConfig::from_toml_str(
            r#"
            [session]
            timeout_secs = 2.5
            echo = true

            [retry]
            max_attempts = 5
            startup_timeout_secs = 10

            [severity]
            delimiter = "|"
            field = 0
            marker = "ERROR"
            "#,
        )
        .unwrap();
        let options = SessionOptions::from_config(&config).unwrap();
        assert_eq!(options.timeout, Some(Duration::from_millis(2500)));
        assert!(options.echo_to_stdout);
        assert_eq!(options.retry.max_attempts, 5);
        assert_eq!(options.retry.startup_timeout, Duration::from_secs(10));
        assert!(options.severity.is_severe("ERROR|x"));
        assert!(!options.subroutines.is_empty());
    }

    #[test]
    fn negative_timeout_is_rejected() {
        let config = DriverConfig::from_toml_str("[session]\ntimeout_secs = -1.0\n").unwrap();
        let err = SessionOptions::from_config(&config).unwrap_err();
        assert!(matches!(err, SessionError::Configuration(_)));
    }

    #[test]
    fn deadlines_resolve() {
        let default = Some(Duration::from_secs(600));
        assert_eq!(Deadline::SessionDefault.resolve(default), default);
        assert_eq!(Deadline::Unbounded.resolve(default), None);
        assert_eq!(
            Deadline::After(Duration::from_secs(1)).resolve(None),
            Some(Duration::from_secs(1))
        );
        let opts = RunOptions::lenient().with_timeout(Duration::from_secs(3));
        assert!(!opts.strict);
        assert_eq!(opts.deadline, Deadline::After(Duration::from_secs(3)));
    }
}
