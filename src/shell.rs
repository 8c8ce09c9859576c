//! The application shell: `Setup → FolderPicker → Terminal`.
//!
//! All state transitions happen on one task, inside [`Shell::step`]. Slow
//! work (dependency probe, install, session spawn) runs in background tasks
//! and reports back through the shell's event channel or the bridge.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use unicode_width::UnicodeWidthStr;

use crate::backend::{Backend, BackendEvent, Subscription, Topic};
use crate::bridge::{BridgeEvent, BridgePhase, SessionBridge};
use crate::config::Config;
use crate::display::host::HostTerminal;
use crate::display::input::{EditAction, LineEditor};
use crate::display::screens::{self, InstallView, SetupContext};
use crate::event::{ShellEvent, ShellReceiver, ShellSender};
use crate::quick_response::{CannedResponse, QuickResponse, folder_label};
use crate::readiness::{ReadinessController, SetupStep};
use crate::store::SessionStore;

/// Row of the folder picker's input line.
const PICKER_INPUT_ROW: u16 = 3;
/// Width of the `> ` prompt before the picker input.
const PICKER_PROMPT_WIDTH: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppView {
    Setup,
    FolderPicker,
    Terminal,
}

#[derive(Debug, Default)]
pub struct ShellOptions {
    /// Folder to open as soon as setup is complete, skipping the picker.
    pub initial_folder: Option<PathBuf>,
    /// Prefill for the folder picker.
    pub launch_dir: Option<PathBuf>,
    /// Pin the host size to `(cols, rows)` instead of querying it.
    pub host_size: Option<(u16, u16)>,
}

type OutputFactory<W> = Box<dyn Fn() -> W>;

pub struct Shell<B: Backend, W: Write = io::Stdout> {
    backend: B,
    config: Config,
    make_out: OutputFactory<W>,
    host_size: Option<(u16, u16)>,
    tx: ShellSender,
    rx: ShellReceiver,

    view: AppView,
    store: SessionStore,
    readiness: ReadinessController,
    install: InstallView,
    install_progress: Option<Subscription>,
    picker: LineEditor,
    picker_error: Option<String>,
    auto_open: Option<PathBuf>,
    bridge: Option<SessionBridge<B, HostTerminal<W>>>,
    /// Id of the session in `bridge`; bumped for every opened folder.
    session_id: u64,
    quick: Option<QuickResponse>,
    show_full_path: bool,
    quit: bool,
}

impl<B: Backend> Shell<B, io::Stdout> {
    /// A shell drawing to stdout.
    pub fn new(
        backend: B,
        config: Config,
        options: ShellOptions,
        channel: (ShellSender, ShellReceiver),
    ) -> Self {
        Self::with_output(backend, config, options, channel, io::stdout)
    }
}

impl<B: Backend, W: Write + 'static> Shell<B, W> {
    pub fn with_output(
        backend: B,
        config: Config,
        options: ShellOptions,
        (tx, rx): (ShellSender, ShellReceiver),
        make_out: impl Fn() -> W + 'static,
    ) -> Self {
        let launch_dir = options
            .launch_dir
            .map(|dir| dir.display().to_string())
            .unwrap_or_default();
        Self {
            backend,
            config,
            make_out: Box::new(make_out),
            host_size: options.host_size,
            tx,
            rx,
            view: AppView::Setup,
            store: SessionStore::new(),
            readiness: ReadinessController::new(),
            install: InstallView::default(),
            install_progress: None,
            picker: LineEditor::with_text(&launch_dir),
            picker_error: None,
            auto_open: options.initial_folder,
            bridge: None,
            session_id: 0,
            quick: None,
            show_full_path: false,
            quit: false,
        }
    }

    pub fn view(&self) -> AppView {
        self.view
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn readiness(&self) -> &ReadinessController {
        &self.readiness
    }

    pub fn install(&self) -> &InstallView {
        &self.install
    }

    pub fn bridge(&self) -> Option<&SessionBridge<B, HostTerminal<W>>> {
        self.bridge.as_ref()
    }

    pub fn picker_error(&self) -> Option<&str> {
        self.picker_error.as_deref()
    }

    pub fn is_done(&self) -> bool {
        self.quit
    }

    /// A sender into the shell's event channel.
    pub fn sender(&self) -> ShellSender {
        self.tx.clone()
    }

    /// Run until the user quits.
    pub async fn run(&mut self) {
        self.start();
        while !self.quit {
            self.step().await;
        }
        tracing::info!("shell finished");
    }

    /// Show the setup screen and start the first dependency probe.
    pub fn start(&mut self) {
        self.enter_setup();
    }

    /// Wait for one event and handle it.
    pub async fn step(&mut self) {
        // The bridge goes first: an exit it reports must be handled before
        // keys queued behind it.
        tokio::select! {
            biased;
            event = next_bridge_event(&mut self.bridge) => self.handle_bridge_event(event),
            Some(event) = self.rx.recv() => self.handle_event(event),
            Some(line) = next_progress_line(&mut self.install_progress) => {
                self.install.push_line(line);
                self.draw();
            }
        }
    }

    fn handle_event(&mut self, event: ShellEvent) {
        match event {
            ShellEvent::Terminal(event) => self.handle_terminal(event),
            ShellEvent::InputClosed => {
                tracing::info!("terminal input closed");
                self.shutdown();
            }
            ShellEvent::DepsChecked(result) => {
                self.readiness.finish_fetch(result);
                if self.view == AppView::Setup {
                    self.check_setup_complete();
                }
            }
            ShellEvent::InstallFinished(result) => self.finish_install(result),
            ShellEvent::SessionExited(id) => self.on_session_exited(id),
        }
    }

    fn handle_terminal(&mut self, event: Event) {
        match event {
            Event::Key(key) if key.kind != KeyEventKind::Release => match self.view {
                AppView::Setup => self.handle_setup_key(&key),
                AppView::FolderPicker => self.handle_picker_key(&key),
                AppView::Terminal => self.handle_terminal_key(&key),
            },
            Event::Paste(text) if self.view == AppView::Terminal => {
                if let Some(widget) = self.bridge.as_ref().and_then(SessionBridge::widget) {
                    widget.handle_paste(&text);
                }
            }
            Event::Resize(cols, rows) => {
                tracing::debug!(cols, rows, "host resized");
                if let Some(bridge) = self.bridge.as_mut() {
                    bridge.resize();
                }
                self.draw();
            }
            _ => {}
        }
    }

    // ── Setup ────────────────────────────────────────────────────────────

    fn enter_setup(&mut self) {
        self.view = AppView::Setup;
        self.ensure_probe();
        self.check_setup_complete();
    }

    /// Start a dependency probe unless one is cached or in flight.
    fn ensure_probe(&mut self) {
        if !self.readiness.needs_fetch() {
            return;
        }
        self.readiness.begin_fetch();
        let backend = self.backend.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = backend.check_dependencies().await;
            tx.send(ShellEvent::DepsChecked(result)).ok();
        });
    }

    fn check_setup_complete(&mut self) {
        if self.readiness.poll_complete() {
            tracing::info!("setup complete");
            match self.auto_open.take() {
                Some(folder) => self.open_folder(&folder),
                None => self.enter_picker(),
            }
        } else {
            self.draw();
        }
    }

    fn handle_setup_key(&mut self, key: &KeyEvent) {
        if is_ctrl_c(key) {
            self.shutdown();
            return;
        }
        let step = self.readiness.step();
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.shutdown(),
            KeyCode::Char('r') if step != SetupStep::Checking && !self.install.running => {
                self.readiness.recheck();
                self.install.error = None;
                self.ensure_probe();
                self.draw();
            }
            KeyCode::Char('i') if step == SetupStep::NeedTool && !self.install.running => {
                self.start_install();
            }
            KeyCode::Char('o') if step == SetupStep::NeedRuntime => {
                let url = &self.config.runtime_download_url;
                tracing::info!(%url, "opening runtime download page");
                if let Err(e) = open::that(url) {
                    tracing::warn!(error = %e, %url, "failed to open browser");
                }
            }
            _ => {}
        }
    }

    fn start_install(&mut self) {
        tracing::info!("installing tool");
        self.install = InstallView {
            running: true,
            ..InstallView::default()
        };
        self.install_progress = Some(self.backend.events().subscribe(Topic::InstallProgress));
        let backend = self.backend.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = backend.install_tool().await;
            tx.send(ShellEvent::InstallFinished(result)).ok();
        });
        self.draw();
    }

    fn finish_install(&mut self, result: crate::error::BackendResult<()>) {
        if let Some(mut progress) = self.install_progress.take() {
            while let Some(event) = progress.try_recv() {
                if let BackendEvent::InstallProgress(line) = event {
                    self.install.push_line(line);
                }
            }
            progress.release();
        }
        self.install.running = false;
        match result {
            Ok(()) => {
                tracing::info!("install finished");
                self.readiness.invalidate();
                self.ensure_probe();
            }
            Err(e) => {
                tracing::error!(error = %e, "install failed");
                self.install.error = Some(e.to_string());
            }
        }
        if self.view == AppView::Setup {
            self.check_setup_complete();
        }
    }

    // ── Folder picker ────────────────────────────────────────────────────

    fn enter_picker(&mut self) {
        self.view = AppView::FolderPicker;
        self.picker_error = None;
        self.draw();
    }

    fn handle_picker_key(&mut self, key: &KeyEvent) {
        match self.picker.handle_key(key) {
            EditAction::None => self.draw(),
            EditAction::Cancel => self.shutdown(),
            EditAction::Submit(text) => match resolve_folder(&text) {
                Ok(folder) => self.open_folder(&folder),
                Err(message) => {
                    tracing::debug!(%text, %message, "folder rejected");
                    self.picker_error = Some(message);
                    self.draw();
                }
            },
        }
    }

    // ── Terminal ─────────────────────────────────────────────────────────

    fn open_folder(&mut self, folder: &Path) {
        tracing::info!(folder = %folder.display(), "opening session");
        self.picker.set_text(&folder.display().to_string());
        self.store.set_folder(Some(folder.to_path_buf()));
        self.view = AppView::Terminal;
        self.show_full_path = false;

        self.session_id += 1;
        let id = self.session_id;
        let tx = self.tx.clone();
        let mut bridge = SessionBridge::new(self.backend.clone()).on_exit(move || {
            tx.send(ShellEvent::SessionExited(id)).ok();
        });
        let widget = self.new_widget();
        bridge.initialize(|| widget);
        self.quick = Some(QuickResponse::new(bridge.input().clone()));

        self.store.set_active(true);
        bridge.spawn(folder.to_path_buf());
        // Reserve the action bar row before the first output arrives.
        bridge.resize();
        bridge.focus();
        self.bridge = Some(bridge);
        self.draw();
    }

    fn new_widget(&self) -> HostTerminal<W> {
        let widget = HostTerminal::with_writer((self.make_out)());
        match self.host_size {
            Some(size) => widget.with_size(size),
            None => widget,
        }
    }

    fn handle_terminal_key(&mut self, key: &KeyEvent) {
        let alt = key.modifiers.contains(KeyModifiers::ALT);
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('y' | 'Y') if alt => self.send_canned(CannedResponse::Accept),
            KeyCode::Char('n' | 'N') if alt => self.send_canned(CannedResponse::Reject),
            KeyCode::Char('i' | 'I') if alt => {
                self.show_full_path = !self.show_full_path;
                self.draw();
            }
            // Legacy terminals report Ctrl+] as Ctrl+5.
            KeyCode::Char(']' | '5') if ctrl => self.return_to_picker(),
            _ => {
                if let Some(widget) = self.bridge.as_ref().and_then(SessionBridge::widget) {
                    widget.handle_key(key);
                }
            }
        }
    }

    fn send_canned(&self, response: CannedResponse) {
        if let Some(quick) = &self.quick {
            quick.send_canned(response);
        }
    }

    fn handle_bridge_event(&mut self, event: BridgeEvent) {
        let failed_spawn = matches!(event, BridgeEvent::Spawned(Err(_)));
        if let Some(bridge) = self.bridge.as_mut() {
            bridge.apply(event);
        }
        if failed_spawn {
            self.draw();
        }
    }

    /// Abandon the session and pick another folder.
    fn return_to_picker(&mut self) {
        tracing::info!("returning to folder picker");
        self.close_session();
        self.store.reset();
        self.enter_picker();
    }

    fn on_session_exited(&mut self, id: u64) {
        if id != self.session_id || self.bridge.is_none() {
            tracing::debug!(id, current = self.session_id, "ignoring exit of an old session");
            return;
        }
        tracing::info!(id, "session exited");
        self.close_session();
        self.store.set_active(false);
        self.store.set_folder(None);
        self.enter_picker();
    }

    fn close_session(&mut self) {
        self.quick = None;
        if let Some(mut bridge) = self.bridge.take() {
            if bridge.phase() != BridgePhase::Exited {
                bridge.kill();
            }
            bridge.teardown();
        }
    }

    fn shutdown(&mut self) {
        self.close_session();
        if let Some(progress) = self.install_progress.take() {
            progress.release();
        }
        self.quit = true;
    }

    // ── Drawing ──────────────────────────────────────────────────────────

    fn draw(&mut self) {
        if self.quit {
            return;
        }
        match self.view {
            AppView::Setup => {
                let lines = screens::setup_lines(&SetupContext {
                    step: self.readiness.step(),
                    status: self.readiness.status(),
                    check_error: self.readiness.last_error(),
                    install: &self.install,
                    config: &self.config,
                });
                screens::draw(&mut (self.make_out)(), &lines, None);
            }
            AppView::FolderPicker => {
                let lines =
                    screens::folder_picker_lines(self.picker.text(), self.picker_error.as_deref());
                let col = PICKER_PROMPT_WIDTH + self.picker.text().width();
                let col = u16::try_from(col).unwrap_or(u16::MAX);
                screens::draw(
                    &mut (self.make_out)(),
                    &lines,
                    Some((col, PICKER_INPUT_ROW)),
                );
            }
            AppView::Terminal => self.draw_action_bar(),
        }
    }

    fn draw_action_bar(&mut self) {
        let Some(folder) = self.store.current_folder() else {
            return;
        };
        let mut line = screens::action_bar_line(folder, self.show_full_path);
        let Some(bridge) = self.bridge.as_mut() else {
            return;
        };
        if bridge.phase() == BridgePhase::Exited {
            line = format!(
                " {}  │  session failed to start · Ctrl+] change folder",
                folder_label(folder)
            );
        }
        if let Some(widget) = bridge.widget_mut() {
            widget.draw_status_line(&line);
        }
    }
}

fn is_ctrl_c(key: &KeyEvent) -> bool {
    key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
}

/// Turn picker input into an existing directory, expanding a leading `~`.
fn resolve_folder(text: &str) -> Result<PathBuf, String> {
    if text.is_empty() {
        return Err("Enter a folder path.".to_string());
    }
    let path = match text.strip_prefix('~') {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest.trim_start_matches('/')),
            None => PathBuf::from(text),
        },
        None => PathBuf::from(text),
    };
    if !path.is_dir() {
        return Err(format!("Not a directory: {}", path.display()));
    }
    Ok(std::fs::canonicalize(&path).unwrap_or(path))
}

async fn next_bridge_event<B: Backend, W: Write>(
    bridge: &mut Option<SessionBridge<B, HostTerminal<W>>>,
) -> BridgeEvent {
    match bridge {
        Some(bridge) => bridge.next_event().await,
        None => std::future::pending().await,
    }
}

async fn next_progress_line(progress: &mut Option<Subscription>) -> Option<String> {
    let Some(progress) = progress.as_mut() else {
        return std::future::pending().await;
    };
    match progress.recv().await {
        Some(BackendEvent::InstallProgress(line)) => Some(line),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn resolve_folder_rejects_files_and_empty_input() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, "x").unwrap();

        assert!(resolve_folder("").is_err());
        let err = resolve_folder(file.to_str().unwrap()).unwrap_err();
        assert!(err.starts_with("Not a directory"));
        let ok = resolve_folder(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(ok, std::fs::canonicalize(dir.path()).unwrap());
    }
}
