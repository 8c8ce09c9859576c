use crossterm::event::Event;
use tokio::sync::mpsc;

use crate::error::BackendResult;
use crate::readiness::DependencyStatus;

/// Unified application event consumed by the shell's event loop.
#[derive(Debug)]
pub enum ShellEvent {
    /// Keyboard, paste or resize input from the host terminal.
    Terminal(Event),
    /// The host terminal's input stream ended.
    InputClosed,
    /// A dependency probe finished.
    DepsChecked(BackendResult<DependencyStatus>),
    /// The tool install finished.
    InstallFinished(BackendResult<()>),
    /// A session ended on its own. Carries the id the shell gave it, so a
    /// notice from an abandoned session can't close its successor.
    SessionExited(u64),
}

pub type ShellSender = mpsc::UnboundedSender<ShellEvent>;
pub type ShellReceiver = mpsc::UnboundedReceiver<ShellEvent>;

pub fn channel() -> (ShellSender, ShellReceiver) {
    mpsc::unbounded_channel()
}

/// Forward host terminal events into the shell's channel from a background
/// task. The task ends when the stream does or the shell goes away.
pub fn spawn_terminal_reader(tx: ShellSender) -> tokio::task::JoinHandle<()> {
    use crossterm::event::EventStream;
    use futures::StreamExt;

    tokio::spawn(async move {
        let mut stream = EventStream::new();
        loop {
            match stream.next().await {
                Some(Ok(event)) => {
                    if tx.send(ShellEvent::Terminal(event)).is_err() {
                        return;
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "terminal input failed");
                    tx.send(ShellEvent::InputClosed).ok();
                    return;
                }
                None => {
                    tx.send(ShellEvent::InputClosed).ok();
                    return;
                }
            }
        }
    })
}
