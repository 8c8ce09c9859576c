//! The command surface the bridge and the setup flow talk to.

pub mod deps;
pub mod events;
pub mod pty;

use std::future::Future;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::BackendResult;
use crate::readiness::DependencyStatus;

pub use events::{BackendEvent, EventBus, Subscription, Topic};
pub use pty::PtyBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSize {
    pub rows: u16,
    pub cols: u16,
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self { rows: 24, cols: 80 }
    }
}

/// Commands understood by the session backend.
///
/// `send_input`, `resize_session` and `kill_session` only enqueue work or
/// issue a single non-blocking syscall, so they are plain calls; the rest
/// suspend.
pub trait Backend: Clone + Send + Sync + 'static {
    fn check_dependencies(&self) -> impl Future<Output = BackendResult<DependencyStatus>> + Send;

    /// Install the assistant. Output lines are published on
    /// [`Topic::InstallProgress`].
    fn install_tool(&self) -> impl Future<Output = BackendResult<()>> + Send;

    /// Start one interactive session rooted at `cwd`, replacing any
    /// previous one.
    fn spawn_session(&self, cwd: PathBuf) -> impl Future<Output = BackendResult<()>> + Send;

    fn send_input(&self, data: &str) -> BackendResult<()>;

    fn resize_session(&self, size: TerminalSize) -> BackendResult<()>;

    /// Ask the session to terminate. The end of the session is reported
    /// through [`Topic::SessionExit`], not by this call.
    fn kill_session(&self) -> BackendResult<()>;

    fn has_active_session(&self) -> bool;

    fn events(&self) -> &EventBus;
}
