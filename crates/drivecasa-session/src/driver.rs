//! The interactive session driver.
//!
//! A [`Session`] owns one running tool process. Every statement is written
//! to a temporary script file and run with `execfile`, so multi-line input
//! never reaches the tool's line editor. The reply is everything printed
//! before the next prompt, minus the echoed `execfile` line.

use std::{
    fmt::Display,
    io::Write,
    path::{Path, PathBuf},
    time::Duration,
};

use drivecasa_commands::{Statement, Subroutine, execfile};
use drivecasa_core::{LaunchSpec, ProcessHandle, ProcessKiller, ToolProcess, ToolSpawner};
use drivecasa_pty::PtySpawner;
use regex::Regex;
use tempfile::NamedTempFile;
use tokio::time::Instant;
use uuid::Uuid;

use crate::{
    audit::CommandLog,
    classify::{ExecutionResult, SeverityClassifier},
    error::{SessionError, SevereCommand},
    expect::{ExpectError, PromptReader},
    options::{RunOptions, SessionOptions},
    retry::RetryPolicy,
};

/// A running tool that has shown its prompt.
struct Started {
    reader: PromptReader,
    input: Box<dyn Write + Send>,
    handle: Box<dyn ProcessHandle>,
}

/// A live interactive tool session.
///
/// Calls take `&mut self`: one command is in flight at a time. Dropping the
/// session kills the tool.
pub struct Session {
    id: Uuid,
    reader: PromptReader,
    input: Box<dyn Write + Send>,
    handle: Box<dyn ProcessHandle>,
    severity: SeverityClassifier,
    timeout: Option<Duration>,
    command_log: Option<CommandLog>,
    working_dir: PathBuf,
    /// The tool has shown a prompt since the last submission.
    ready: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("pid", &self.handle.pid())
            .field("working_dir", &self.working_dir)
            .field("ready", &self.ready)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Start the tool on a pseudo terminal.
    ///
    /// # Errors
    /// See [`Session::open_with`].
    pub async fn open(options: SessionOptions) -> Result<Self, SessionError> {
        Self::open_with(options, &PtySpawner::new()).await
    }

    /// Start the tool with the given spawner.
    ///
    /// Creates the working directory, creates the audit log, launches the
    /// tool (retrying launches that never prompt) and loads the configured
    /// subroutines.
    ///
    /// # Errors
    /// - [`SessionError::Configuration`] for a bad prompt pattern or an
    ///   existing audit log.
    /// - [`SessionError::Spawn`] if the tool cannot be launched, or no
    ///   attempt reached a prompt.
    /// - Any error from loading a subroutine.
    pub async fn open_with<S>(options: SessionOptions, spawner: &S) -> Result<Self, SessionError>
    where
        S: ToolSpawner + ?Sized,
    {
        let prompt = Regex::new(&options.prompt).map_err(|e| {
            SessionError::Configuration(format!("invalid prompt pattern: {e}"))
        })?;

        tokio::fs::create_dir_all(&options.working_dir).await?;
        let command_log = match &options.commands_log {
            Some(path) => Some(CommandLog::create(path).await?),
            None => None,
        };

        let id = Uuid::new_v4();
        let launch = options.launch_spec();
        tracing::info!(
            session = %id,
            command = %launch.display_command(),
            cwd = %launch.cwd.display(),
            "Starting tool"
        );
        let started =
            start_tool(spawner, &launch, &prompt, options.retry, options.echo_to_stdout).await;
        let Started {
            reader,
            input,
            handle,
        } = match started {
            Ok(started) => started,
            Err(e) => {
                if let Some(log) = command_log {
                    log.discard().await;
                }
                return Err(e);
            }
        };

        let mut session = Self {
            id,
            reader,
            input,
            handle,
            severity: options.severity,
            timeout: options.timeout,
            command_log,
            working_dir: options.working_dir,
            ready: true,
        };
        session.load_subroutines(&options.subroutines).await?;
        Ok(session)
    }

    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.handle.pid()
    }

    /// False after a timeout, until the outstanding prompt arrives.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.ready
    }

    #[must_use]
    pub fn is_alive(&mut self) -> bool {
        !self.handle.has_exited()
    }

    /// Default per-command timeout.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// Tee raw tool output to a writer, or stop with `None`.
    pub fn set_echo(&mut self, echo: Option<Box<dyn Write + Send>>) {
        self.reader.set_echo(echo);
    }

    /// A handle that can kill the tool from another task.
    #[must_use]
    pub fn killer(&self) -> Box<dyn ProcessKiller> {
        self.handle.killer()
    }

    /// Run statements one at a time.
    ///
    /// Each statement is logged to the audit log, then executed from its own
    /// temporary script file. Results are concatenated in order.
    ///
    /// # Errors
    /// - [`SessionError::SevereCommand`] in strict mode, naming the first
    ///   statement that produced severe diagnostics. Later statements are not
    ///   submitted.
    /// - [`SessionError::CommandTimeout`] if a statement outlives the deadline.
    #[tracing::instrument(skip_all, fields(session = %self.id))]
    pub async fn run_commands<I>(
        &mut self,
        commands: I,
        options: RunOptions,
    ) -> Result<ExecutionResult, SessionError>
    where
        I: IntoIterator,
        I::Item: Display,
    {
        let mut total = ExecutionResult::default();
        for command in commands {
            let command = command.to_string();
            let script = script_file(&command)?;
            if let Some(log) = self.command_log.as_mut() {
                log.record(&command).await?;
            }

            match self.execute(script.path(), options).await {
                Ok(result) => total.extend(result),
                Err(SessionError::SevereCommand(severe)) => {
                    let SevereCommand {
                        script,
                        output,
                        errors,
                        ..
                    } = *severe;
                    total.extend(ExecutionResult { output, errors });
                    tracing::debug!(%command, "Command produced severe errors");
                    return Err(SessionError::SevereCommand(Box::new(SevereCommand {
                        command: Some(command),
                        script,
                        output: total.output,
                        errors: total.errors,
                    })));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }

    /// Validate typed statements, then run them as [`Session::run_commands`]
    /// does. Nothing is submitted if any statement is invalid.
    ///
    /// # Errors
    /// [`SessionError::Statement`] for an invalid name, else as for
    /// [`Session::run_commands`].
    pub async fn run_statements(
        &mut self,
        statements: &[Statement],
        options: RunOptions,
    ) -> Result<ExecutionResult, SessionError> {
        for statement in statements {
            statement.validate()?;
        }
        self.run_commands(statements, options).await
    }

    /// Run an existing script file with `execfile`.
    ///
    /// The `execfile` statement is what goes into the audit log.
    ///
    /// # Errors
    /// As for [`Session::run_commands`]; a severe error carries no command.
    #[tracing::instrument(skip(self, options), fields(session = %self.id))]
    pub async fn run_script_file(
        &mut self,
        path: &Path,
        options: RunOptions,
    ) -> Result<ExecutionResult, SessionError> {
        let path = std::path::absolute(path)?;
        if let Some(log) = self.command_log.as_mut() {
            log.record(&execfile(&path).to_string()).await?;
        }
        self.execute(&path, options).await
    }

    /// Kill the tool.
    ///
    /// # Errors
    /// Returns error if the kill signal cannot be delivered.
    pub fn close(mut self) -> std::io::Result<()> {
        tracing::info!(session = %self.id, "Closing session");
        self.handle.kill()
    }

    async fn load_subroutines(&mut self, subroutines: &[Subroutine]) -> Result<(), SessionError> {
        for subroutine in subroutines {
            let script = script_file(&subroutine.source)?;
            self.execute(script.path(), RunOptions::strict()).await?;
            tracing::debug!(session = %self.id, name = %subroutine.name, "Loaded subroutine");
        }
        Ok(())
    }

    async fn execute(
        &mut self,
        script: &Path,
        options: RunOptions,
    ) -> Result<ExecutionResult, SessionError> {
        let script = std::path::absolute(script)?;
        let statement = execfile(&script).to_string();
        let started = Instant::now();
        let deadline = options
            .deadline
            .resolve(self.timeout)
            .and_then(|timeout| started.checked_add(timeout));

        if !self.ready {
            tracing::debug!(session = %self.id, "Waiting for outstanding prompt");
            self.await_prompt(deadline, &statement, started).await?;
        }

        self.send_line(&statement)?;
        let response = self.await_prompt(deadline, &statement, started).await?;
        let result = self.severity.classify_response(&response);
        tracing::debug!(
            session = %self.id,
            script = %script.display(),
            output_lines = result.output.len(),
            error_lines = result.errors.len(),
            "Script executed"
        );

        if options.strict && result.has_errors() {
            return Err(SessionError::SevereCommand(Box::new(SevereCommand {
                command: None,
                script,
                output: result.output,
                errors: result.errors,
            })));
        }
        Ok(result)
    }

    async fn await_prompt(
        &mut self,
        deadline: Option<Instant>,
        statement: &str,
        started: Instant,
    ) -> Result<String, SessionError> {
        match self.reader.expect(deadline).await {
            Ok(text) => {
                self.ready = true;
                Ok(text)
            }
            Err(ExpectError::Timeout) => {
                let elapsed = started.elapsed();
                tracing::warn!(session = %self.id, %statement, ?elapsed, "Timed out waiting for prompt");
                Err(SessionError::CommandTimeout {
                    statement: statement.to_string(),
                    elapsed,
                })
            }
            Err(ExpectError::Eof(output)) => {
                tracing::error!(session = %self.id, %statement, "Tool exited");
                Err(SessionError::ProcessExited { output })
            }
        }
    }

    fn send_line(&mut self, line: &str) -> std::io::Result<()> {
        self.ready = false;
        self.input.write_all(line.as_bytes())?;
        self.input.write_all(b"\n")?;
        self.input.flush()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.handle.has_exited() {
            if let Err(e) = self.handle.kill() {
                tracing::debug!(session = %self.id, error = %e, "Failed to kill tool on drop");
            }
        }
    }
}

/// Launch until a process shows its prompt, or attempts run out.
async fn start_tool<S>(
    spawner: &S,
    launch: &LaunchSpec,
    prompt: &Regex,
    retry: RetryPolicy,
    echo_to_stdout: bool,
) -> Result<Started, SessionError>
where
    S: ToolSpawner + ?Sized,
{
    let attempts = retry.attempts();
    let max_attempts = *attempts.end();
    for attempt in attempts {
        let ToolProcess {
            output,
            input,
            mut handle,
        } = spawner
            .spawn(launch)
            .await
            .map_err(|e| SessionError::Spawn(e.to_string()))?;

        let echo = echo_to_stdout.then(stdout_sink);
        let mut reader = PromptReader::new(output, prompt.clone(), echo);
        let deadline = Instant::now().checked_add(retry.startup_timeout);
        match reader.expect(deadline).await {
            Ok(_) => {
                tracing::info!(attempt, pid = ?handle.pid(), "Tool ready");
                return Ok(Started {
                    reader,
                    input,
                    handle,
                });
            }
            Err(ExpectError::Timeout) => tracing::warn!(
                attempt,
                max_attempts,
                timeout = ?retry.startup_timeout,
                "Tool did not prompt in time"
            ),
            Err(ExpectError::Eof(output)) => tracing::warn!(
                attempt,
                max_attempts,
                output = %output.trim_end(),
                "Tool exited before prompting"
            ),
        }
        if let Err(e) = handle.kill() {
            tracing::debug!(error = %e, "Failed to kill unresponsive tool");
        }
    }
    Err(SessionError::Spawn(format!(
        "no prompt after {max_attempts} attempt(s)"
    )))
}

fn stdout_sink() -> Box<dyn Write + Send> {
    Box::new(std::io::stdout())
}

/// A temporary `.py` file holding `text` and a trailing newline.
/// Removed when dropped.
fn script_file(text: &str) -> std::io::Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("drivecasa-")
        .suffix(".py")
        .tempfile()?;
    file.write_all(text.as_bytes())?;
    file.write_all(b"\n")?;
    file.flush()?;
    Ok(file)
}
