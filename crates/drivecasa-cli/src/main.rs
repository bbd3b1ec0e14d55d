//! `drive-casa`: run statements and scripts through an interactive CASA
//! session, or image a set of observations.

mod cli;
mod image;
mod listings;
mod run;

use std::{path::Path, process::ExitCode};

use anyhow::Context;
use clap::Parser;
use drivecasa_core::{AppContext, DriverConfig};
use drivecasa_session::{Session, SessionOptions};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command, expand_tilde};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_filter().into()),
        )
        .init();

    match drive(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn drive(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = cli.load_config()?;
    let mut ctx = AppContext::new(config.session.working_dir.clone());
    let mut options = session_options(&config, &ctx)?;

    let output_dir = match &cli.command {
        Command::Image { output_dir, .. } => {
            let output_dir = expand_tilde(output_dir);
            std::fs::create_dir_all(&output_dir)
                .with_context(|| format!("failed to create {}", output_dir.display()))?;
            if options.commands_log.is_none() {
                options.commands_log = Some(timestamped_commands_log(&output_dir));
            }
            Some(output_dir)
        }
        Command::Run { .. } => None,
    };

    let mut session = Session::open(options)
        .await
        .context("failed to start CASA")?;
    tracing::info!(session = %session.id(), pid = ?session.pid(), "Session open");

    let mut killer = session.killer();
    ctx.shutdown.register("casa", move || async move {
        if let Err(e) = killer.kill() {
            tracing::warn!(error = %e, "Failed to kill CASA");
        }
    });

    let outcome = tokio::select! {
        outcome = execute(&cli.command, &mut session, &mut ctx, output_dir.as_deref()) => outcome,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted");
            Ok(ExitCode::from(130))
        }
    };

    ctx.shutdown.run().await;
    drop(session);
    outcome
}

async fn execute(
    command: &Command,
    session: &mut Session,
    ctx: &mut AppContext,
    output_dir: Option<&Path>,
) -> anyhow::Result<ExitCode> {
    match command {
        Command::Run {
            commands,
            scripts,
            lenient,
        } => {
            let result = run::run_batch(session, commands, scripts, *lenient).await?;
            run::report(&result);
            if result.has_errors() {
                tracing::warn!(errors = result.errors.len(), "CASA reported severe errors");
            }
            Ok(ExitCode::from(run::exit_status(&result)))
        }
        Command::Image { listings, .. } => {
            let output_dir = output_dir.context("output directory not prepared")?;
            let listings = listings::load_listings(&expand_tilde(listings))?;
            let groups = listings::group_listings(listings);
            listings::log_preamble(&groups);

            let summary = image::image_groups(session, ctx, &groups, output_dir).await?;
            tracing::info!(
                imaged = summary.imaged.len(),
                failed = summary.failed.len(),
                "Imaging finished"
            );
            if let Some(failed) = ctx.get_metadata("failed_observations") {
                tracing::debug!(%failed, "Failed observations");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Session options for `config`, running CASA in the context's working
/// directory.
fn session_options(config: &DriverConfig, ctx: &AppContext) -> anyhow::Result<SessionOptions> {
    let mut options = SessionOptions::from_config(config)?;
    options.working_dir.clone_from(&ctx.working_dir);
    Ok(options)
}

/// `<dir>/casa_commands_<YYYYmmdd_HHMMSS>.log`.
fn timestamped_commands_log(dir: &Path) -> std::path::PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    dir.join(format!("casa_commands_{stamp}.log"))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn session_runs_in_context_working_dir() {
        let config = DriverConfig::default();
        let ctx = AppContext::new(PathBuf::from("/tmp/drivecasa-ctx"));
        let options = session_options(&config, &ctx).unwrap();
        assert_eq!(options.working_dir, ctx.working_dir);
        assert_eq!(options.launch_spec().cwd, ctx.working_dir);
    }

    #[test]
    fn commands_log_is_timestamped_in_dir() {
        let path = timestamped_commands_log(Path::new("/results"));
        assert_eq!(path.parent(), Some(Path::new("/results")));
        let name = path.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("casa_commands_") && name.ends_with(".log"));
    }
}
