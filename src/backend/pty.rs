//! PTY-backed session backend.
//!
//! One interactive session at a time. Output is read on a dedicated thread
//! and published on the event bus; input goes through a channel drained by
//! a writer thread so concurrent callers are serialized in call order.

use std::future::Future;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use portable_pty::{Child, ChildKiller, CommandBuilder, MasterPty, PtySize, native_pty_system};
use tokio::sync::mpsc;

use super::events::{BackendEvent, EventBus};
use super::{Backend, TerminalSize, deps};
use crate::config::Config;
use crate::error::{BackendError, BackendResult};
use crate::readiness::DependencyStatus;

const READ_CHUNK_SIZE: usize = 4096;

struct PtySession {
    generation: u64,
    child: Box<dyn Child + Send + Sync>,
    /// Signals the child without waiting on it.
    killer: Box<dyn ChildKiller + Send + Sync>,
    master: Box<dyn MasterPty + Send>,
    stdin_tx: mpsc::UnboundedSender<Vec<u8>>,
}

struct Inner {
    config: Config,
    session: Mutex<Option<PtySession>>,
    /// Bumped on every spawn; readers of older sessions go quiet.
    generation: AtomicU64,
    events: EventBus,
}

impl Inner {
    fn session(&self) -> MutexGuard<'_, Option<PtySession>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }
}

#[derive(Clone)]
pub struct PtyBackend {
    inner: Arc<Inner>,
}

impl PtyBackend {
    pub fn new(config: Config) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                session: Mutex::new(None),
                generation: AtomicU64::new(0),
                events: EventBus::new(),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }
}

impl Backend for PtyBackend {
    fn check_dependencies(&self) -> impl Future<Output = BackendResult<DependencyStatus>> + Send {
        let inner = Arc::clone(&self.inner);
        async move { Ok(deps::check_dependencies(&inner.config).await) }
    }

    fn install_tool(&self) -> impl Future<Output = BackendResult<()>> + Send {
        let inner = Arc::clone(&self.inner);
        async move { deps::install_tool(&inner.config, &inner.events).await }
    }

    fn spawn_session(&self, cwd: PathBuf) -> impl Future<Output = BackendResult<()>> + Send {
        let inner = Arc::clone(&self.inner);
        async move {
            tokio::task::spawn_blocking(move || spawn_pty_session(&inner, &cwd))
                .await
                .map_err(|e| BackendError::Spawn(format!("spawn task failed: {e}")))?
        }
    }

    fn send_input(&self, data: &str) -> BackendResult<()> {
        let guard = self.inner.session();
        let session = guard.as_ref().ok_or(BackendError::NoActiveSession)?;
        session
            .stdin_tx
            .send(data.as_bytes().to_vec())
            .map_err(|_| BackendError::Pty("session input is closed".to_string()))
    }

    fn resize_session(&self, size: TerminalSize) -> BackendResult<()> {
        if size.rows == 0 || size.cols == 0 {
            return Err(BackendError::Pty(
                "resize requires non-zero rows and columns".to_string(),
            ));
        }
        let guard = self.inner.session();
        let session = guard.as_ref().ok_or(BackendError::NoActiveSession)?;
        session
            .master
            .resize(pty_size(size))
            .map_err(|e| BackendError::Pty(format!("failed to resize: {e}")))?;
        tracing::debug!(rows = size.rows, cols = size.cols, "session resized");
        Ok(())
    }

    fn kill_session(&self) -> BackendResult<()> {
        let (generation, mut killer) = {
            let guard = self.inner.session();
            let session = guard.as_ref().ok_or(BackendError::NoActiveSession)?;
            (session.generation, session.killer.clone_killer())
        };
        // One signal; the reader reports the exit once the child is gone.
        tracing::info!(generation, "killing session");
        killer.kill()?;
        Ok(())
    }

    fn has_active_session(&self) -> bool {
        self.inner.session().is_some()
    }

    fn events(&self) -> &EventBus {
        &self.inner.events
    }
}

fn pty_size(size: TerminalSize) -> PtySize {
    PtySize {
        rows: size.rows,
        cols: size.cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

fn spawn_pty_session(inner: &Arc<Inner>, cwd: &Path) -> BackendResult<()> {
    let config = &inner.config;
    tracing::info!(cwd = %cwd.display(), program = %config.tool_command, "spawning session");
    if !cwd.is_dir() {
        return Err(BackendError::Spawn(format!(
            "{} is not a directory",
            cwd.display()
        )));
    }

    let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
    let previous = inner.session().take();
    if let Some(mut previous) = previous {
        tracing::info!(generation = previous.generation, "replacing existing session");
        previous.child.kill().ok();
        previous.child.wait().ok();
    }

    let pair = native_pty_system()
        .openpty(pty_size(TerminalSize::default()))
        .map_err(|e| BackendError::Pty(format!("failed to open pty: {e}")))?;

    let mut cmd = CommandBuilder::new(&config.tool_command);
    cmd.args(&config.tool_args);
    cmd.cwd(cwd);
    cmd.env("TERM", &config.term);
    cmd.env("COLORTERM", "truecolor");

    let child = pair
        .slave
        .spawn_command(cmd)
        .map_err(|e| BackendError::Spawn(format!("failed to spawn {}: {e}", config.tool_command)))?;
    // The reader only sees EOF once every slave handle is closed.
    drop(pair.slave);
    let killer = child.clone_killer();

    let reader = pair
        .master
        .try_clone_reader()
        .map_err(|e| BackendError::Pty(format!("failed to get pty reader: {e}")))?;
    let writer = pair
        .master
        .take_writer()
        .map_err(|e| BackendError::Pty(format!("failed to get pty writer: {e}")))?;

    let (stdin_tx, stdin_rx) = mpsc::unbounded_channel();
    *inner.session() = Some(PtySession {
        generation,
        child,
        killer,
        master: pair.master,
        stdin_tx,
    });

    spawn_write_loop(writer, stdin_rx);
    spawn_read_loop(Arc::clone(inner), reader, generation);
    tracing::info!(generation, "session spawned");
    Ok(())
}

fn spawn_write_loop(mut writer: Box<dyn Write + Send>, mut stdin_rx: mpsc::UnboundedReceiver<Vec<u8>>) {
    thread::spawn(move || {
        while let Some(bytes) = stdin_rx.blocking_recv() {
            if let Err(e) = writer.write_all(&bytes).and_then(|()| writer.flush()) {
                tracing::warn!(error = %e, "failed to write to pty");
                break;
            }
        }
    });
}

fn spawn_read_loop(inner: Arc<Inner>, mut reader: Box<dyn Read + Send>, generation: u64) {
    thread::spawn(move || {
        let mut buffer = [0u8; READ_CHUNK_SIZE];
        let mut decoder = Utf8Decoder::default();
        loop {
            match reader.read(&mut buffer) {
                Ok(0) => {
                    tracing::info!(generation, "pty closed (eof)");
                    break;
                }
                Ok(n) => {
                    if !inner.is_current(generation) {
                        return;
                    }
                    let text = decoder.decode(&buffer[..n]);
                    if !text.is_empty() {
                        inner.events.emit(BackendEvent::Output(text));
                    }
                }
                Err(e) => {
                    // Linux reports EIO once the child side is gone.
                    tracing::info!(generation, error = %e, "pty read ended");
                    break;
                }
            }
        }
        finish_session(&inner, generation);
    });
}

/// Reap the child and announce the exit, unless a newer session has
/// already replaced this one.
fn finish_session(inner: &Inner, generation: u64) {
    let finished = {
        let mut guard = inner.session();
        if guard.as_ref().is_some_and(|s| s.generation == generation) {
            guard.take()
        } else {
            None
        }
    };
    if let Some(mut session) = finished {
        match session.child.wait() {
            Ok(status) => tracing::info!(generation, code = status.exit_code(), "session exited"),
            Err(e) => tracing::warn!(generation, error = %e, "failed to reap session"),
        }
    }
    if inner.is_current(generation) {
        inner.events.emit(BackendEvent::Exit);
    }
}

/// Decodes a byte stream as UTF-8 without splitting characters that straddle
/// read boundaries. Invalid sequences become U+FFFD.
#[derive(Default)]
struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(s) => {
                    out.push_str(s);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(std::str::from_utf8(&self.pending[..valid]).unwrap_or_default());
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                        None => {
                            // Incomplete trailing sequence: keep it for the next read.
                            self.pending.drain(..valid);
                            return out;
                        }
                    }
                }
            }
        }
    }
}
