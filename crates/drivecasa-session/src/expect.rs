//! Reading tool output up to the next prompt.

use std::io::Write;

use regex::Regex;
use tokio::{sync::mpsc, time::Instant};

/// Why no prompt arrived.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ExpectError {
    Timeout,
    /// Output closed. Carries whatever text was buffered.
    Eof(String),
}

/// Buffers decoded output and splits it at prompt matches.
pub(crate) struct PromptReader {
    output: mpsc::UnboundedReceiver<Vec<u8>>,
    prompt: Regex,
    buffer: String,
    /// Bytes of an incomplete UTF-8 sequence at the end of the last chunk.
    pending: Vec<u8>,
    echo: Option<Box<dyn Write + Send>>,
}

impl PromptReader {
    pub(crate) fn new(
        output: mpsc::UnboundedReceiver<Vec<u8>>,
        prompt: Regex,
        echo: Option<Box<dyn Write + Send>>,
    ) -> Self {
        Self {
            output,
            prompt,
            buffer: String::new(),
            pending: Vec::new(),
            echo,
        }
    }

    pub(crate) fn set_echo(&mut self, echo: Option<Box<dyn Write + Send>>) {
        self.echo = echo;
    }

    /// Wait for the next prompt and return the text before it.
    ///
    /// Text after the prompt stays buffered for the next call. `None` waits
    /// without limit.
    pub(crate) async fn expect(&mut self, deadline: Option<Instant>) -> Result<String, ExpectError> {
        loop {
            if let Some((start, end)) = self.prompt.find(&self.buffer).map(|m| (m.start(), m.end())) {
                let before = self.buffer[..start].to_string();
                self.buffer.drain(..end);
                return Ok(before);
            }

            let next = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, self.output.recv())
                    .await
                    .map_err(|_| ExpectError::Timeout)?,
                None => self.output.recv().await,
            };
            match next {
                Some(chunk) => self.push(&chunk),
                None => return Err(ExpectError::Eof(std::mem::take(&mut self.buffer))),
            }
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        if let Some(echo) = self.echo.as_mut() {
            // Echo failures are ignored.
            let _ = echo.write_all(chunk).and_then(|()| echo.flush());
        }

        self.pending.extend_from_slice(chunk);
        match std::str::from_utf8(&self.pending) {
            Ok(text) => {
                self.buffer.push_str(text);
                self.pending.clear();
            }
            Err(e) if e.error_len().is_none() => {
                let valid = e.valid_up_to();
                self.buffer
                    .push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                self.pending.drain(..valid);
            }
            Err(_) => {
                self.buffer.push_str(&String::from_utf8_lossy(&self.pending));
                self.pending.clear();
            }
        }
    }
}
