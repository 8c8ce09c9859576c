//! Dependency gating in front of session mode.
//!
//! The setup step is always derived from the latest [`DependencyStatus`]
//! snapshot; there is no stored step to fall out of sync with reality.

use serde::{Deserialize, Serialize};

use crate::backend::Backend;

/// Snapshot of what the machine has installed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyStatus {
    /// Runtime version (e.g. `v20.10.0`), `None` if not found.
    pub runtime_version: Option<String>,
    /// Assistant CLI version, `None` if not found.
    pub tool_version: Option<String>,
    pub authenticated: bool,
}

impl DependencyStatus {
    pub fn runtime_present(&self) -> bool {
        self.runtime_version.is_some()
    }

    pub fn tool_present(&self) -> bool {
        self.tool_version.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SetupStep {
    Checking,
    NeedRuntime,
    NeedTool,
    NeedAuth,
    Ready,
}

impl SetupStep {
    pub fn name(self) -> &'static str {
        match self {
            SetupStep::Checking => "checking",
            SetupStep::NeedRuntime => "need-runtime",
            SetupStep::NeedTool => "need-tool",
            SetupStep::NeedAuth => "need-auth",
            SetupStep::Ready => "ready",
        }
    }
}

/// Derive the setup step.
///
/// Runtime is checked before the tool and the tool before auth: each later
/// check is meaningless while an earlier one fails.
pub fn evaluate(status: Option<&DependencyStatus>, loading: bool) -> SetupStep {
    let Some(status) = status else {
        return SetupStep::Checking;
    };
    if loading {
        SetupStep::Checking
    } else if !status.runtime_present() {
        SetupStep::NeedRuntime
    } else if !status.tool_present() {
        SetupStep::NeedTool
    } else if !status.authenticated {
        SetupStep::NeedAuth
    } else {
        SetupStep::Ready
    }
}

/// Owns the cached dependency snapshot and the one-shot completion latch.
#[derive(Debug, Default)]
pub struct ReadinessController {
    status: Option<DependencyStatus>,
    loading: bool,
    /// Set once the "setup complete" notification has been handed out.
    notified: bool,
    last_error: Option<String>,
}

impl ReadinessController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> SetupStep {
        evaluate(self.status.as_ref(), self.loading)
    }

    pub fn status(&self) -> Option<&DependencyStatus> {
        self.status.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Message from the last failed probe, cleared by the next success.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Whether a probe is needed: nothing cached and nothing in flight.
    pub fn needs_fetch(&self) -> bool {
        self.status.is_none() && !self.loading
    }

    /// Mark a probe as in flight.
    pub fn begin_fetch(&mut self) {
        self.loading = true;
    }

    /// Record the result of a probe started with [`Self::begin_fetch`].
    ///
    /// A failed probe counts as "nothing installed" so the user lands on a
    /// recheckable step instead of a dead end.
    pub fn finish_fetch(&mut self, result: crate::error::BackendResult<DependencyStatus>) {
        self.loading = false;
        match result {
            Ok(status) => {
                tracing::info!(?status, "dependency status");
                self.status = Some(status);
                self.last_error = None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "dependency check failed");
                self.status = Some(DependencyStatus::default());
                self.last_error = Some(e.to_string());
            }
        }
    }

    /// Fetch the status from `backend` unless a snapshot is cached.
    pub async fn refresh<B: Backend>(&mut self, backend: &B) {
        if !self.needs_fetch() {
            return;
        }
        self.begin_fetch();
        let result = backend.check_dependencies().await;
        self.finish_fetch(result);
    }

    /// Returns `true` exactly once per entry into [`SetupStep::Ready`].
    pub fn poll_complete(&mut self) -> bool {
        if self.step() == SetupStep::Ready && !self.notified {
            self.notified = true;
            true
        } else {
            false
        }
    }

    /// Drop the cached snapshot and re-arm the completion latch.
    pub fn recheck(&mut self) {
        tracing::debug!("recheck requested");
        self.status = None;
        self.notified = false;
    }

    /// Drop the cached snapshot without touching the latch (used after a
    /// successful install).
    pub fn invalidate(&mut self) {
        self.status = None;
    }
}
