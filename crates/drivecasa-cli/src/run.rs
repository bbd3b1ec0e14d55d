//! The `run` command.

use std::path::PathBuf;

use drivecasa_session::{ExecutionResult, RunOptions, Session};

use crate::cli::expand_tilde;

/// Run the statements, then each script file, in one session.
///
/// # Errors
/// Returns the first session error; in strict mode that includes severe
/// diagnostics.
pub async fn run_batch(
    session: &mut Session,
    commands: &[String],
    scripts: &[PathBuf],
    lenient: bool,
) -> anyhow::Result<ExecutionResult> {
    let options = if lenient {
        RunOptions::lenient()
    } else {
        RunOptions::strict()
    };

    let mut total = session.run_commands(commands, options).await?;
    for script in scripts {
        let script = expand_tilde(script);
        tracing::debug!(script = %script.display(), "Running script file");
        total.extend(session.run_script_file(&script, options).await?);
    }
    Ok(total)
}

/// Print output lines to stdout and severe lines to stderr.
pub fn report(result: &ExecutionResult) {
    for line in &result.output {
        println!("{line}");
    }
    for line in &result.errors {
        eprintln!("{line}");
    }
}

/// Process exit status for a finished batch: 1 if any severe lines were
/// collected, else 0.
#[must_use]
pub fn exit_status(result: &ExecutionResult) -> u8 {
    u8::from(result.has_errors())
}
