//! Shared session state read by the action bar, the folder picker and the
//! exit path.
//!
//! The shell owns the single [`SessionStore`] and lends it out; every
//! mutation is a plain assignment, visible as soon as the call returns.

use std::path::{Path, PathBuf};

/// What the assistant is waiting on, when it is waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingKind {
    /// A yes/no decision.
    Decision,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub active: bool,
    pub current_folder: Option<PathBuf>,
    /// Nothing sets this yet; reserved for a future "waiting for a decision"
    /// signal from the session.
    pub pending_action: Option<PendingKind>,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    state: SessionState,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.active
    }

    pub fn current_folder(&self) -> Option<&Path> {
        self.state.current_folder.as_deref()
    }

    pub fn pending_action(&self) -> Option<PendingKind> {
        self.state.pending_action
    }

    pub fn set_active(&mut self, active: bool) {
        tracing::debug!(active, "session store: set_active");
        self.state.active = active;
    }

    pub fn set_folder(&mut self, folder: Option<PathBuf>) {
        tracing::debug!(?folder, "session store: set_folder");
        self.state.current_folder = folder;
    }

    pub fn set_pending_action(&mut self, action: Option<PendingKind>) {
        tracing::debug!(?action, "session store: set_pending_action");
        self.state.pending_action = action;
    }

    /// Restore the startup state exactly.
    pub fn reset(&mut self) {
        tracing::debug!("session store: reset");
        self.state = SessionState::default();
    }
}
