//! The session bridge: one terminal widget bound to at most one backend
//! session.
//!
//! Lifecycle: `Uninitialized → WidgetReady → Spawning → Streaming → Exited`.
//! `Exited` is final for a bridge; a new session needs a new bridge.

pub mod input;
pub mod widget;

use std::path::PathBuf;

use tokio::task::JoinHandle;

use crate::backend::{Backend, BackendEvent, Subscription, Topic};
use crate::error::BackendResult;

pub use input::InputChannel;
pub use widget::TerminalWidget;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgePhase {
    Uninitialized,
    WidgetReady,
    Spawning,
    Streaming,
    Exited,
}

/// Something the bridge has to react to, produced by
/// [`SessionBridge::next_event`] and consumed by [`SessionBridge::apply`].
#[derive(Debug)]
pub enum BridgeEvent {
    /// The backend answered the spawn request.
    Spawned(BackendResult<()>),
    Output(String),
    Exit,
}

type ExitHook = Box<dyn FnMut() + Send>;

struct SessionSubscriptions {
    output: Subscription,
    exit: Subscription,
}

impl SessionSubscriptions {
    fn release(self) {
        self.output.release();
        self.exit.release();
    }
}

struct SessionHandle<W> {
    widget: W,
    subscriptions: Option<SessionSubscriptions>,
    /// In-flight spawn request. Dropping it detaches, it does not cancel.
    pending_spawn: Option<JoinHandle<BackendResult<()>>>,
}

pub struct SessionBridge<B: Backend, W: TerminalWidget> {
    backend: B,
    input: InputChannel,
    handle: Option<SessionHandle<W>>,
    phase: BridgePhase,
    on_exit: Option<ExitHook>,
}

impl<B: Backend, W: TerminalWidget> SessionBridge<B, W> {
    pub fn new(backend: B) -> Self {
        let input = InputChannel::new(backend.clone());
        Self {
            backend,
            input,
            handle: None,
            phase: BridgePhase::Uninitialized,
            on_exit: None,
        }
    }

    /// Called after the backend reports the session has ended. Not called
    /// for spawn failures or [`Self::teardown`].
    #[must_use]
    pub fn on_exit(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.on_exit = Some(Box::new(hook));
        self
    }

    pub fn phase(&self) -> BridgePhase {
        self.phase
    }

    /// Whether this bridge has used up its one spawn.
    pub fn has_spawned(&self) -> bool {
        matches!(
            self.phase,
            BridgePhase::Spawning | BridgePhase::Streaming | BridgePhase::Exited
        )
    }

    /// The input path shared by the widget and the quick-response controls.
    pub fn input(&self) -> &InputChannel {
        &self.input
    }

    pub fn widget(&self) -> Option<&W> {
        self.handle.as_ref().map(|h| &h.widget)
    }

    pub fn widget_mut(&mut self) -> Option<&mut W> {
        self.handle.as_mut().map(|h| &mut h.widget)
    }

    /// Construct the widget and wire its input to the backend.
    /// Only the first call has any effect.
    pub fn initialize(&mut self, open: impl FnOnce() -> W) {
        if self.phase != BridgePhase::Uninitialized {
            tracing::debug!(phase = ?self.phase, "bridge already initialized");
            return;
        }
        let mut widget = open();
        widget.on_data(self.input.clone());
        self.handle = Some(SessionHandle {
            widget,
            subscriptions: None,
            pending_spawn: None,
        });
        self.phase = BridgePhase::WidgetReady;
        tracing::info!("terminal initialized");
    }

    /// Start the session in `cwd`. Allowed once, from `WidgetReady`.
    ///
    /// Output and exit subscriptions are in place before the spawn request
    /// goes out, so nothing the session prints early is lost.
    pub fn spawn(&mut self, cwd: PathBuf) {
        if self.phase != BridgePhase::WidgetReady {
            tracing::warn!(phase = ?self.phase, "spawn ignored");
            return;
        }
        let Some(handle) = self.handle.as_mut() else {
            return;
        };

        handle.widget.clear();
        let events = self.backend.events();
        handle.subscriptions = Some(SessionSubscriptions {
            output: events.subscribe(Topic::SessionOutput),
            exit: events.subscribe(Topic::SessionExit),
        });
        self.phase = BridgePhase::Spawning;

        tracing::info!(cwd = %cwd.display(), "requesting session");
        let backend = self.backend.clone();
        handle.pending_spawn = Some(tokio::spawn(async move {
            backend.spawn_session(cwd).await
        }));
    }

    /// Wait for the next thing to react to. Cancel-safe, so it can sit in a
    /// `tokio::select!` next to other sources. Never resolves once the
    /// session is over.
    pub async fn next_event(&mut self) -> BridgeEvent {
        let Some(handle) = self.handle.as_mut() else {
            return std::future::pending().await;
        };
        let SessionHandle {
            subscriptions,
            pending_spawn,
            ..
        } = handle;
        let Some(subs) = subscriptions.as_mut() else {
            return std::future::pending().await;
        };

        // Output is polled first: the exit event is published after the
        // last chunk, so draining output first keeps the tail on screen.
        tokio::select! {
            biased;
            Some(BackendEvent::Output(chunk)) = subs.output.recv() => BridgeEvent::Output(chunk),
            result = wait_spawn(pending_spawn) => BridgeEvent::Spawned(result),
            Some(BackendEvent::Exit) = subs.exit.recv() => BridgeEvent::Exit,
            else => std::future::pending().await,
        }
    }

    /// Advance the state machine for `event`.
    pub fn apply(&mut self, event: BridgeEvent) {
        match event {
            BridgeEvent::Spawned(Ok(())) => {
                if self.phase != BridgePhase::Spawning {
                    return;
                }
                self.phase = BridgePhase::Streaming;
                tracing::info!("session spawned");
                self.resize();
            }
            BridgeEvent::Spawned(Err(e)) => {
                if self.phase != BridgePhase::Spawning {
                    return;
                }
                tracing::error!(error = %e, "failed to spawn session");
                if let Some(handle) = self.handle.as_mut() {
                    handle.widget.write_error(&e.to_string());
                    if let Some(subs) = handle.subscriptions.take() {
                        subs.release();
                    }
                }
                self.phase = BridgePhase::Exited;
            }
            BridgeEvent::Output(chunk) => {
                if !self.is_live() {
                    return;
                }
                if let Some(handle) = self.handle.as_mut() {
                    handle.widget.write(&chunk);
                }
            }
            BridgeEvent::Exit => {
                if !self.is_live() {
                    return;
                }
                tracing::info!("session ended");
                if let Some(handle) = self.handle.as_mut() {
                    if let Some(subs) = handle.subscriptions.take() {
                        subs.release();
                    }
                    handle.pending_spawn = None;
                }
                self.phase = BridgePhase::Exited;
                if let Some(hook) = self.on_exit.as_mut() {
                    hook();
                }
            }
        }
    }

    /// Wait for one event and apply it.
    pub async fn pump(&mut self) {
        let event = self.next_event().await;
        self.apply(event);
    }

    /// Refit the widget and tell the backend the new size. Fire-and-forget:
    /// a failure is logged and the next resize corrects it.
    pub fn resize(&mut self) {
        let Some(handle) = self.handle.as_mut() else {
            return;
        };
        let Some(size) = handle.widget.propose_dimensions() else {
            return;
        };
        if self.phase != BridgePhase::Streaming {
            return;
        }
        if let Err(e) = self.backend.resize_session(size) {
            tracing::warn!(error = %e, rows = size.rows, cols = size.cols, "failed to resize session");
        }
    }

    /// Ask the backend to end the session. The bridge only moves to
    /// `Exited` when the exit event arrives.
    pub fn kill(&self) {
        if let Err(e) = self.backend.kill_session() {
            tracing::warn!(error = %e, "failed to kill session");
        }
    }

    pub fn focus(&mut self) {
        if let Some(handle) = self.handle.as_mut() {
            handle.widget.focus();
        }
    }

    /// Release subscriptions, dispose the widget and drop the handle.
    /// Safe in every phase and idempotent; never runs the exit hook.
    pub fn teardown(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            if let Some(subs) = handle.subscriptions.take() {
                subs.release();
            }
            if handle.pending_spawn.take().is_some() {
                tracing::debug!("detaching in-flight spawn");
            }
            handle.widget.dispose();
            tracing::debug!(phase = ?self.phase, "bridge torn down");
        }
        self.phase = BridgePhase::Exited;
    }

    fn is_live(&self) -> bool {
        matches!(self.phase, BridgePhase::Spawning | BridgePhase::Streaming)
    }
}

impl<B: Backend, W: TerminalWidget> Drop for SessionBridge<B, W> {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn wait_spawn(pending: &mut Option<JoinHandle<BackendResult<()>>>) -> BackendResult<()> {
    let Some(task) = pending.as_mut() else {
        return std::future::pending().await;
    };
    let result = task.await;
    *pending = None;
    result.unwrap_or_else(|e| Err(crate::error::BackendError::Spawn(format!("spawn task failed: {e}"))))
}
