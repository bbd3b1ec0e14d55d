//! Command-line arguments and their merge onto the configuration file.

use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand};
use drivecasa_core::DriverConfig;

#[derive(Debug, Parser)]
#[command(name = "drive-casa")]
#[command(about = "Drive an interactive CASA session from statements and scripts", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (TOML)
    #[arg(long, global = true, env = "DRIVECASA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Top-level CASA install directory
    #[arg(long, global = true, env = "CASA_DIR")]
    pub casa_dir: Option<PathBuf>,

    /// Directory CASA runs in
    #[arg(long, global = true)]
    pub working_dir: Option<PathBuf>,

    /// Record every submitted statement here (must not exist)
    #[arg(long, global = true)]
    pub commands_log: Option<PathBuf>,

    /// Per-command timeout in seconds; 0 waits forever
    #[arg(long, global = true)]
    pub timeout: Option<f64>,

    /// Copy CASA's terminal output to stdout
    #[arg(long, global = true)]
    pub echo: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run statements, then script files, in one session
    Run {
        /// Statement to run (repeatable)
        #[arg(short = 'c', long = "command")]
        commands: Vec<String>,

        /// Script files to execute after the statements
        scripts: Vec<PathBuf>,

        /// Collect severe errors instead of stopping at the first
        #[arg(long)]
        lenient: bool,
    },

    /// Make dirty and clean maps for every observation in a listings file
    Image {
        /// JSON object of observation records
        listings: PathBuf,

        /// Output root; one subdirectory per group
        #[arg(short, long, default_value = "~/ami_results")]
        output_dir: PathBuf,
    },
}

impl Cli {
    /// The configuration file (or defaults) with command-line overrides applied.
    ///
    /// # Errors
    /// Returns error if the configuration file cannot be read or parsed, or
    /// the timeout is negative or not finite.
    pub fn load_config(&self) -> anyhow::Result<DriverConfig> {
        let mut config = match &self.config {
            Some(path) => DriverConfig::load(&expand_tilde(path))?,
            None => DriverConfig::default(),
        };
        if let Some(dir) = &self.casa_dir {
            config.tool.install_dir = Some(expand_tilde(dir));
        }
        if let Some(dir) = &self.working_dir {
            config.session.working_dir = expand_tilde(dir);
        }
        if let Some(log) = &self.commands_log {
            config.session.commands_log = Some(expand_tilde(log));
        }
        if let Some(secs) = self.timeout {
            anyhow::ensure!(
                secs.is_finite() && secs >= 0.0,
                "--timeout must be a non-negative number of seconds, got {secs}"
            );
            config.session.timeout_secs = (secs > 0.0).then_some(secs);
        }
        if self.echo {
            config.session.echo = true;
        }
        Ok(config)
    }

    /// Default log filter for the verbosity flag.
    #[must_use]
    pub const fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Replace a leading `~` with the home directory.
#[must_use]
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir().map_or_else(|| path.to_path_buf(), |home| home.join(rest)),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_collects_statements_and_scripts() {
        let cli = Cli::try_parse_from([
            "drive-casa",
            "run",
            "-c",
            "tasklist()",
            "--command",
            "print 1",
            "a.py",
            "b.py",
            "--lenient",
        ])
        .unwrap();
        match cli.command {
            Command::Run {
                commands,
                scripts,
                lenient,
            } => {
                assert_eq!(commands, vec!["tasklist()", "print 1"]);
                assert_eq!(scripts, vec![PathBuf::from("a.py"), PathBuf::from("b.py")]);
                assert!(lenient);
            }
            Command::Image { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn overrides_apply_over_defaults() {
        let cli = Cli::try_parse_from([
            "drive-casa",
            "--working-dir",
            "/tmp/casa-work",
            "--timeout",
            "0",
            "--echo",
            "-vv",
            "image",
            "listings.json",
        ])
        .unwrap();
        let config = cli.load_config().unwrap();
        assert_eq!(config.session.working_dir, PathBuf::from("/tmp/casa-work"));
        assert_eq!(config.session.timeout_secs, None);
        assert!(config.session.echo);
        assert_eq!(cli.log_filter(), "trace");
    }

    #[test]
    fn negative_or_nan_timeout_is_rejected() {
        for bad in ["--timeout=-5", "--timeout=NaN", "--timeout=inf"] {
            let cli = Cli::try_parse_from(["drive-casa", bad, "run"]).unwrap();
            let err = cli.load_config().unwrap_err();
            assert!(err.to_string().contains("--timeout"), "{bad}: {err}");
        }
    }

    #[test]
    fn config_file_is_loaded_then_overridden() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drivecasa.toml");
        std::fs::write(&path, "[session]\ntimeout_secs = 30\necho = true\n").unwrap();
        let config_arg = path.to_string_lossy().into_owned();

        let cli = Cli::try_parse_from([
            "drive-casa",
            "--config",
            config_arg.as_str(),
            "--timeout",
            "5",
            "run",
        ])
        .unwrap();
        let config = cli.load_config().unwrap();
        assert_eq!(config.session.timeout_secs, Some(5.0));
        assert!(config.session.echo);
    }

    #[test]
    fn tilde_expands_to_home() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        assert_eq!(expand_tilde(Path::new("~/results")), home.join("results"));
        assert_eq!(expand_tilde(Path::new("/abs/path")), PathBuf::from("/abs/path"));
    }
}
