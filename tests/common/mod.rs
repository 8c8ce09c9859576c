//! Recording fakes for the backend and the terminal widget.

#![allow(dead_code, clippy::unwrap_used)]

use std::future::Future;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use myclod::backend::{Backend, BackendEvent, EventBus, TerminalSize, Topic};
use myclod::bridge::{InputChannel, TerminalWidget};
use myclod::error::{BackendError, BackendResult};
use myclod::readiness::DependencyStatus;
use tokio::sync::Notify;

pub const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CheckDependencies,
    InstallTool,
    /// Live output/exit subscriptions at the moment the spawn was requested.
    Spawn {
        cwd: PathBuf,
        live_output: usize,
        live_exit: usize,
    },
    Input(String),
    Resize(TerminalSize),
    Kill,
}

struct FakeState {
    calls: Vec<Call>,
    status: Result<DependencyStatus, String>,
    spawn_error: Option<String>,
    spawn_gate: Option<Arc<Notify>>,
    install_lines: Vec<String>,
    install_error: Option<String>,
}

#[derive(Clone)]
pub struct FakeBackend {
    events: EventBus,
    state: Arc<Mutex<FakeState>>,
}

pub fn ready_status() -> DependencyStatus {
    DependencyStatus {
        runtime_version: Some("v20.10.0".to_string()),
        tool_version: Some("1.0.0".to_string()),
        authenticated: true,
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            events: EventBus::new(),
            state: Arc::new(Mutex::new(FakeState {
                calls: Vec::new(),
                status: Ok(ready_status()),
                spawn_error: None,
                spawn_gate: None,
                install_lines: Vec::new(),
                install_error: None,
            })),
        }
    }

    pub fn set_status(&self, status: DependencyStatus) {
        self.state.lock().unwrap().status = Ok(status);
    }

    pub fn fail_probe(&self, message: &str) {
        self.state.lock().unwrap().status = Err(message.to_string());
    }

    pub fn fail_spawn(&self, message: &str) {
        self.state.lock().unwrap().spawn_error = Some(message.to_string());
    }

    /// Make spawn requests wait until the returned handle is notified.
    pub fn hold_spawn(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state.lock().unwrap().spawn_gate = Some(Arc::clone(&gate));
        gate
    }

    pub fn set_install(&self, lines: &[&str], error: Option<&str>) {
        let mut state = self.state.lock().unwrap();
        state.install_lines = lines.iter().map(|l| (*l).to_string()).collect();
        state.install_error = error.map(String::from);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn inputs(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Input(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn spawn_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Spawn { .. }))
            .count()
    }

    pub fn emit_output(&self, chunk: &str) -> usize {
        self.events.emit(BackendEvent::Output(chunk.to_string()))
    }

    pub fn emit_exit(&self) -> usize {
        self.events.emit(BackendEvent::Exit)
    }

    pub fn live(&self, topic: Topic) -> usize {
        self.events.live_subscriptions(topic)
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

impl Backend for FakeBackend {
    fn check_dependencies(&self) -> impl Future<Output = BackendResult<DependencyStatus>> + Send {
        let this = self.clone();
        async move {
            this.record(Call::CheckDependencies);
            let status = this.state.lock().unwrap().status.clone();
            status.map_err(BackendError::Probe)
        }
    }

    fn install_tool(&self) -> impl Future<Output = BackendResult<()>> + Send {
        let this = self.clone();
        async move {
            this.record(Call::InstallTool);
            let (lines, error) = {
                let state = this.state.lock().unwrap();
                (state.install_lines.clone(), state.install_error.clone())
            };
            for line in lines {
                this.events.emit(BackendEvent::InstallProgress(line));
            }
            match error {
                Some(message) => Err(BackendError::Install(message)),
                None => Ok(()),
            }
        }
    }

    fn spawn_session(&self, cwd: PathBuf) -> impl Future<Output = BackendResult<()>> + Send {
        let this = self.clone();
        async move {
            this.record(Call::Spawn {
                cwd,
                live_output: this.live(Topic::SessionOutput),
                live_exit: this.live(Topic::SessionExit),
            });
            let (gate, error) = {
                let state = this.state.lock().unwrap();
                (state.spawn_gate.clone(), state.spawn_error.clone())
            };
            if let Some(gate) = gate {
                gate.notified().await;
            }
            match error {
                Some(message) => Err(BackendError::Spawn(message)),
                None => Ok(()),
            }
        }
    }

    fn send_input(&self, data: &str) -> BackendResult<()> {
        self.record(Call::Input(data.to_string()));
        Ok(())
    }

    fn resize_session(&self, size: TerminalSize) -> BackendResult<()> {
        self.record(Call::Resize(size));
        Ok(())
    }

    fn kill_session(&self) -> BackendResult<()> {
        self.record(Call::Kill);
        Ok(())
    }

    fn has_active_session(&self) -> bool {
        self.spawn_count() > 0
    }

    fn events(&self) -> &EventBus {
        &self.events
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetOp {
    Clear,
    Write(String),
    Propose,
    Focus,
    Dispose,
}

/// Widget whose operations are recorded in a log shared with the test.
pub struct FakeWidget {
    log: Arc<Mutex<Vec<WidgetOp>>>,
    input: Option<InputChannel>,
    size: TerminalSize,
}

impl FakeWidget {
    pub fn new() -> (Self, Arc<Mutex<Vec<WidgetOp>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let widget = Self {
            log: Arc::clone(&log),
            input: None,
            size: TerminalSize { rows: 30, cols: 100 },
        };
        (widget, log)
    }

    /// Simulate the user typing `text`.
    pub fn type_text(&self, text: &str) {
        if let Some(input) = &self.input {
            input.send(text);
        }
    }

    fn push(&self, op: WidgetOp) {
        self.log.lock().unwrap().push(op);
    }
}

impl TerminalWidget for FakeWidget {
    fn on_data(&mut self, input: InputChannel) {
        self.input = Some(input);
    }

    fn clear(&mut self) {
        self.push(WidgetOp::Clear);
    }

    fn write(&mut self, data: &str) {
        self.push(WidgetOp::Write(data.to_string()));
    }

    fn propose_dimensions(&mut self) -> Option<TerminalSize> {
        self.push(WidgetOp::Propose);
        Some(self.size)
    }

    fn focus(&mut self) {
        self.push(WidgetOp::Focus);
    }

    fn dispose(&mut self) {
        self.push(WidgetOp::Dispose);
    }
}

pub fn writes(log: &Arc<Mutex<Vec<WidgetOp>>>) -> Vec<String> {
    log.lock()
        .unwrap()
        .iter()
        .filter_map(|op| match op {
            WidgetOp::Write(s) => Some(s.clone()),
            _ => None,
        })
        .collect()
}

/// A writer whose bytes can be read back after it has been handed out.
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
