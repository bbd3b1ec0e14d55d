//! Launch the tool inside a pseudo terminal.
//!
//! The tool's interactive shell only behaves (prompting, echoing input) when
//! attached to a terminal, so it is run on a PTY rather than plain pipes.

use std::io::{self, ErrorKind, Read};

use async_trait::async_trait;
use drivecasa_core::{
    LaunchSpec, ProcessError, ProcessHandle, ProcessKiller, ToolProcess, ToolSpawner,
};
use portable_pty::{Child, ChildKiller, CommandBuilder, MasterPty, PtySize, native_pty_system};
use tokio::sync::mpsc;

use crate::env::resolve_executable_path;

/// Wide enough that echoed statements are never wrapped by the terminal.
const PTY_COLS: u16 = 1024;
const PTY_ROWS: u16 = 48;
const READ_BUF: usize = 8192;

/// Spawns tool processes on a native PTY.
#[derive(Debug, Clone)]
pub struct PtySpawner {
    size: PtySize,
}

impl Default for PtySpawner {
    fn default() -> Self {
        Self::new()
    }
}

impl PtySpawner {
    /// Create a spawner with the default (wide) terminal geometry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            size: PtySize {
                rows: PTY_ROWS,
                cols: PTY_COLS,
                pixel_width: 0,
                pixel_height: 0,
            },
        }
    }

    /// Override the terminal geometry.
    #[must_use]
    pub fn with_size(mut self, cols: u16, rows: u16) -> Self {
        self.size.cols = cols;
        self.size.rows = rows;
        self
    }
}

#[async_trait]
impl ToolSpawner for PtySpawner {
    async fn spawn(&self, launch: &LaunchSpec) -> Result<ToolProcess, ProcessError> {
        let program = resolve_executable_path(&launch.program, &launch.env).ok_or_else(|| {
            ProcessError::ExecutableNotFound(launch.program.display().to_string())
        })?;

        let pair = native_pty_system()
            .openpty(self.size)
            .map_err(|e| ProcessError::SpawnFailed(format!("openpty: {e}")))?;

        let mut cmd = CommandBuilder::new(&program);
        cmd.args(&launch.args);
        cmd.cwd(&launch.cwd);
        cmd.env_clear();
        for (key, value) in &launch.env {
            cmd.env(key, value);
        }
        // Keep the tool's line editor away from fancy terminal handling.
        cmd.env("TERM", "dumb");

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| ProcessError::SpawnFailed(format!("{}: {e}", program.display())))?;
        // The slave end must close in this process, or EOF never arrives.
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| ProcessError::SpawnFailed(format!("clone reader: {e}")))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| ProcessError::SpawnFailed(format!("take writer: {e}")))?;

        let pid = child.process_id();
        tracing::info!(
            pid = ?pid,
            cwd = %launch.cwd.display(),
            command = %launch.display_command(),
            "Spawned tool"
        );

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::task::spawn_blocking(move || read_loop(reader, &tx));

        Ok(ToolProcess {
            output: rx,
            input: writer,
            handle: Box::new(PtyHandle {
                child,
                _master: pair.master,
            }),
        })
    }
}

fn read_loop(mut reader: Box<dyn Read + Send>, tx: &mpsc::UnboundedSender<Vec<u8>>) {
    let mut buf = [0u8; READ_BUF];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(ref e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => {
                // Linux reports EIO on the master once the child side closes.
                tracing::debug!(error = %e, "PTY read ended");
                break;
            }
        }
    }
}

/// Child process plus the master side of its terminal.
struct PtyHandle {
    child: Box<dyn Child + Send + Sync>,
    _master: Box<dyn MasterPty + Send>,
}

impl ProcessHandle for PtyHandle {
    fn pid(&self) -> Option<u32> {
        self.child.process_id()
    }

    fn has_exited(&mut self) -> bool {
        !matches!(self.child.try_wait(), Ok(None))
    }

    fn kill(&mut self) -> io::Result<()> {
        if self.has_exited() {
            return Ok(());
        }
        self.child.kill()?;
        // Reap so the child does not linger as a zombie.
        let _ = self.child.wait();
        Ok(())
    }

    fn killer(&self) -> Box<dyn ProcessKiller> {
        Box::new(PtyKiller(self.child.clone_killer()))
    }
}

struct PtyKiller(Box<dyn ChildKiller + Send + Sync>);

impl ProcessKiller for PtyKiller {
    fn kill(&mut self) -> io::Result<()> {
        match self.0.kill() {
            Err(e) if e.kind() != ErrorKind::NotFound && e.raw_os_error() != Some(3) => Err(e),
            _ => Ok(()),
        }
    }
}
