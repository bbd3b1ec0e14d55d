//! Scripted in-memory tool for driver tests.
//!
//! Each submitted `execfile('<path>')` line is echoed, then the script file is
//! read and interpreted line by line:
//!
//! - `print <text>` prints the text
//! - `severe <msg>` prints a logger line tagged `SEVERE`
//! - `slow <ms>` delays the whole reply
//! - `exit` closes the output stream without a prompt
//!
//! Anything else prints nothing. The reply ends with a fresh prompt.

use std::{
    collections::VecDeque,
    io::{self, Write},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use drivecasa_core::{
    LaunchSpec, ProcessError, ProcessHandle, ProcessKiller, ToolProcess, ToolSpawner,
};
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};

/// How one launch behaves.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Attempt {
    /// Prompts immediately.
    Ready,
    /// Prints a banner and never prompts.
    Silent,
    /// Prints a line and exits.
    Exits,
    /// The launch itself fails.
    Fails,
}

#[derive(Default)]
pub(crate) struct ScriptedSpawner {
    attempts: Mutex<VecDeque<Attempt>>,
    launches: AtomicUsize,
    kills: Arc<AtomicUsize>,
    executed: Arc<Mutex<Vec<String>>>,
}

impl ScriptedSpawner {
    /// Launches follow `attempts`, then are [`Attempt::Ready`].
    pub(crate) fn new(attempts: impl IntoIterator<Item = Attempt>) -> Self {
        Self {
            attempts: Mutex::new(attempts.into_iter().collect()),
            ..Self::default()
        }
    }

    pub(crate) fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub(crate) fn kills(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }

    /// Contents of every script file executed, in order.
    pub(crate) fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolSpawner for ScriptedSpawner {
    async fn spawn(&self, _launch: &LaunchSpec) -> Result<ToolProcess, ProcessError> {
        let attempt = self
            .attempts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Attempt::Ready);
        self.launches.fetch_add(1, Ordering::SeqCst);

        let (tx, rx) = unbounded_channel();
        let mut input = FakeInput {
            tx: None,
            pending: Vec::new(),
            prompt_no: 1,
            executed: Arc::clone(&self.executed),
        };
        let mut keepalive = None;
        match attempt {
            Attempt::Ready => {
                tx.send(b"fake tool 1.0\r\nIn [1]: ".to_vec()).unwrap();
                input.tx = Some(tx);
            }
            Attempt::Silent => {
                tx.send(b"loading...\r\n".to_vec()).unwrap();
                keepalive = Some(tx);
            }
            Attempt::Exits => {
                tx.send(b"fatal: cannot open display\r\n".to_vec()).unwrap();
            }
            Attempt::Fails => {
                return Err(ProcessError::ExecutableNotFound("casa".into()));
            }
        }

        Ok(ToolProcess {
            output: rx,
            input: Box::new(input),
            handle: Box::new(FakeHandle {
                exited: Arc::new(AtomicBool::new(false)),
                kills: Arc::clone(&self.kills),
                _keepalive: keepalive,
            }),
        })
    }
}

struct FakeInput {
    tx: Option<UnboundedSender<Vec<u8>>>,
    pending: Vec<u8>,
    prompt_no: usize,
    executed: Arc<Mutex<Vec<String>>>,
}

impl FakeInput {
    fn respond(&mut self, line: &str) -> io::Result<()> {
        let tx = self
            .tx
            .clone()
            .ok_or_else(|| io::Error::from(io::ErrorKind::BrokenPipe))?;
        let script = match line
            .strip_prefix("execfile('")
            .and_then(|rest| rest.strip_suffix("')"))
        {
            Some(path) => std::fs::read_to_string(path)?,
            None => String::new(),
        };
        self.executed.lock().unwrap().push(script.clone());

        let mut reply = format!("{line}\r\n");
        let mut delay = None;
        for command in script.lines() {
            if let Some(text) = command.strip_prefix("print ") {
                reply.push_str(text);
                reply.push_str("\r\n");
            } else if let Some(msg) = command.strip_prefix("severe ") {
                reply.push_str("2015-01-01 00:00:00\tSEVERE\tfake::run\t");
                reply.push_str(msg);
                reply.push_str("\r\n");
            } else if let Some(ms) = command.strip_prefix("slow ") {
                delay = ms.parse().ok().map(Duration::from_millis);
            } else if command == "exit" {
                self.tx = None;
                let _ = tx.send(reply.into_bytes());
                return Ok(());
            }
        }

        self.prompt_no += 1;
        reply.push_str(&format!("In [{}]: ", self.prompt_no));
        match delay {
            Some(delay) => {
                std::thread::spawn(move || {
                    std::thread::sleep(delay);
                    let _ = tx.send(reply.into_bytes());
                });
            }
            None => {
                let _ = tx.send(reply.into_bytes());
            }
        }
        Ok(())
    }
}

impl Write for FakeInput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line).trim_end().to_string();
            self.respond(&line)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct FakeHandle {
    exited: Arc<AtomicBool>,
    kills: Arc<AtomicUsize>,
    _keepalive: Option<UnboundedSender<Vec<u8>>>,
}

impl ProcessHandle for FakeHandle {
    fn pid(&self) -> Option<u32> {
        None
    }

    fn has_exited(&mut self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }

    fn kill(&mut self) -> io::Result<()> {
        if !self.exited.swap(true, Ordering::SeqCst) {
            self.kills.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn killer(&self) -> Box<dyn ProcessKiller> {
        Box::new(FakeKiller {
            exited: Arc::clone(&self.exited),
            kills: Arc::clone(&self.kills),
        })
    }
}

struct FakeKiller {
    exited: Arc<AtomicBool>,
    kills: Arc<AtomicUsize>,
}

impl ProcessKiller for FakeKiller {
    fn kill(&mut self) -> io::Result<()> {
        if !self.exited.swap(true, Ordering::SeqCst) {
            self.kills.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
