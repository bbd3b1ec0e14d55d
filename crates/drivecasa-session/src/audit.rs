//! Append-only audit log of submitted statements.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

use crate::error::SessionError;

/// One statement per line, flushed as each is written.
pub struct CommandLog {
    path: Option<PathBuf>,
    writer: BufWriter<Box<dyn AsyncWrite + Send + Unpin>>,
}

impl std::fmt::Debug for CommandLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandLog").field("path", &self.path).finish()
    }
}

impl CommandLog {
    /// Create a new log file. An existing file is never reused.
    ///
    /// # Errors
    /// Returns [`SessionError::Configuration`] if the path exists, or
    /// [`SessionError::Io`] if it cannot be created.
    pub async fn create(path: &Path) -> Result<Self, SessionError> {
        let file = tokio::fs::OpenOptions::new()
            .append(true)
            .create_new(true)
            .open(path)
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    SessionError::Configuration(format!(
                        "commands log {} already exists",
                        path.display()
                    ))
                } else {
                    SessionError::Io(e)
                }
            })?;
        tracing::debug!(path = %path.display(), "Opened commands log");
        Ok(Self {
            path: Some(path.to_path_buf()),
            writer: BufWriter::new(Box::new(file)),
        })
    }

    /// Log into an arbitrary writer.
    #[must_use]
    pub fn from_writer(writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            path: None,
            writer: BufWriter::new(Box::new(writer)),
        }
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append one statement and flush.
    ///
    /// # Errors
    /// Returns error if the write fails.
    pub async fn record(&mut self, statement: &str) -> std::io::Result<()> {
        self.writer.write_all(statement.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await
    }

    /// Close the log and delete its file, for a session that never started.
    pub async fn discard(self) {
        let Some(path) = self.path else {
            return;
        };
        drop(self.writer);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove commands log");
        }
    }
}
