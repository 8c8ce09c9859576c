#![allow(clippy::unwrap_used)]

mod common;

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use common::{Call, FakeBackend, FakeWidget, WAIT, WidgetOp, writes};
use myclod::backend::{TerminalSize, Topic};
use myclod::bridge::{BridgePhase, SessionBridge};
use myclod::quick_response::{CannedResponse, QuickResponse};

type Bridge = SessionBridge<FakeBackend, FakeWidget>;
type WidgetLog = Arc<Mutex<Vec<WidgetOp>>>;

fn cwd() -> PathBuf {
    PathBuf::from("/work/project")
}

/// A bridge with an initialized widget and an exit-hook counter.
fn bridge(backend: &FakeBackend) -> (Bridge, WidgetLog, Arc<AtomicUsize>) {
    let exits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&exits);
    let mut bridge = SessionBridge::new(backend.clone()).on_exit(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let (widget, log) = FakeWidget::new();
    bridge.initialize(|| widget);
    (bridge, log, exits)
}

async fn pump(bridge: &mut Bridge) {
    tokio::time::timeout(WAIT, bridge.pump())
        .await
        .expect("bridge produced no event");
}

/// A bridge that has spawned and seen the spawn acknowledgment.
async fn streaming(backend: &FakeBackend) -> (Bridge, WidgetLog, Arc<AtomicUsize>) {
    let (mut bridge, log, exits) = bridge(backend);
    bridge.spawn(cwd());
    pump(&mut bridge).await;
    assert_eq!(bridge.phase(), BridgePhase::Streaming);
    (bridge, log, exits)
}

#[tokio::test]
async fn initialize_runs_once() {
    let backend = FakeBackend::new();
    let (mut bridge, _log, _) = bridge(&backend);
    let mut opened = 0;
    bridge.initialize(|| {
        opened += 1;
        FakeWidget::new().0
    });
    assert_eq!(opened, 0);
    assert_eq!(bridge.phase(), BridgePhase::WidgetReady);
    assert!(!bridge.has_spawned());
}

#[tokio::test]
async fn spawn_before_initialize_is_ignored() {
    let backend = FakeBackend::new();
    let mut bridge: Bridge = SessionBridge::new(backend.clone());
    bridge.spawn(cwd());
    assert_eq!(bridge.phase(), BridgePhase::Uninitialized);
    assert_eq!(backend.live(Topic::SessionOutput), 0);
    tokio::task::yield_now().await;
    assert_eq!(backend.spawn_count(), 0);
}

#[tokio::test]
async fn subscriptions_exist_before_spawn_request() {
    let backend = FakeBackend::new();
    let (bridge, log, _) = streaming(&backend).await;

    assert_eq!(
        backend.calls()[0],
        Call::Spawn {
            cwd: cwd(),
            live_output: 1,
            live_exit: 1,
        }
    );
    assert_eq!(backend.live(Topic::SessionOutput), 1);
    assert_eq!(backend.live(Topic::SessionExit), 1);
    assert_eq!(log.lock().unwrap()[0], WidgetOp::Clear);
    assert!(bridge.has_spawned());
}

#[tokio::test]
async fn spawn_ack_negotiates_size() {
    let backend = FakeBackend::new();
    let (_bridge, log, _) = streaming(&backend).await;
    assert_eq!(
        backend.calls()[1],
        Call::Resize(TerminalSize { rows: 30, cols: 100 })
    );
    assert!(log.lock().unwrap().contains(&WidgetOp::Propose));
}

#[tokio::test]
async fn second_spawn_is_ignored() {
    let backend = FakeBackend::new();
    let (mut bridge, _log, _) = streaming(&backend).await;
    bridge.spawn(PathBuf::from("/elsewhere"));
    tokio::task::yield_now().await;
    assert_eq!(backend.spawn_count(), 1);
    assert_eq!(backend.live(Topic::SessionOutput), 1);
    assert_eq!(bridge.phase(), BridgePhase::Streaming);
}

#[tokio::test]
async fn output_is_written_in_order() {
    let backend = FakeBackend::new();
    let (mut bridge, log, _) = streaming(&backend).await;
    for chunk in ["A", "B", "C"] {
        assert_eq!(backend.emit_output(chunk), 1);
    }
    for _ in 0..3 {
        pump(&mut bridge).await;
    }
    assert_eq!(writes(&log), ["A", "B", "C"]);
}

#[tokio::test]
async fn output_before_ack_is_kept() {
    let backend = FakeBackend::new();
    let gate = backend.hold_spawn();
    let (mut bridge, log, _) = bridge(&backend);
    bridge.spawn(cwd());
    backend.emit_output("banner");
    pump(&mut bridge).await;
    assert_eq!(bridge.phase(), BridgePhase::Spawning);
    assert_eq!(writes(&log), ["banner"]);

    gate.notify_one();
    pump(&mut bridge).await;
    assert_eq!(bridge.phase(), BridgePhase::Streaming);
}

#[tokio::test]
async fn exit_releases_subscriptions_and_runs_hook() {
    let backend = FakeBackend::new();
    let (mut bridge, log, exits) = streaming(&backend).await;
    backend.emit_output("last words");
    backend.emit_exit();
    pump(&mut bridge).await;
    pump(&mut bridge).await;

    assert_eq!(writes(&log), ["last words"]);
    assert_eq!(bridge.phase(), BridgePhase::Exited);
    assert_eq!(exits.load(Ordering::SeqCst), 1);
    assert_eq!(backend.live(Topic::SessionOutput), 0);
    assert_eq!(backend.live(Topic::SessionExit), 0);
    assert_eq!(backend.emit_output("late"), 0);
}

#[tokio::test]
async fn kill_does_not_end_the_session_by_itself() {
    let backend = FakeBackend::new();
    let (bridge, _log, exits) = streaming(&backend).await;

    bridge.kill();
    assert!(backend.calls().contains(&Call::Kill));
    assert_eq!(bridge.phase(), BridgePhase::Streaming);
    assert_eq!(exits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn typed_keys_and_quick_responses_share_one_input_path() {
    let backend = FakeBackend::new();
    let (bridge, _log, _) = streaming(&backend).await;
    let quick = QuickResponse::new(bridge.input().clone());

    bridge.widget().unwrap().type_text("ls");
    quick.send_canned(CannedResponse::Accept);
    bridge.widget().unwrap().type_text("\r");
    quick.send_canned(CannedResponse::Reject);

    assert_eq!(backend.inputs(), ["ls", "y\n", "\r", "n\n"]);
}

#[tokio::test]
async fn resize_before_streaming_stays_local() {
    let backend = FakeBackend::new();
    let (mut bridge, log, _) = bridge(&backend);
    bridge.resize();
    assert!(log.lock().unwrap().contains(&WidgetOp::Propose));
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn spawn_failure_shows_error_without_exit_hook() {
    let backend = FakeBackend::new();
    backend.fail_spawn("claude: not found");
    let (mut bridge, log, exits) = bridge(&backend);
    bridge.spawn(cwd());
    pump(&mut bridge).await;

    assert_eq!(bridge.phase(), BridgePhase::Exited);
    assert_eq!(exits.load(Ordering::SeqCst), 0);
    assert_eq!(backend.live(Topic::SessionOutput), 0);
    assert_eq!(backend.live(Topic::SessionExit), 0);
    let written = writes(&log).concat();
    assert!(written.contains("\x1b[31mError: failed to spawn session: claude: not found"));
    assert!(!backend.calls().iter().any(|c| matches!(c, Call::Resize(_))));
}

#[tokio::test]
async fn teardown_before_spawn() {
    let backend = FakeBackend::new();
    let (mut bridge, log, exits) = bridge(&backend);
    bridge.teardown();
    bridge.teardown();

    assert_eq!(bridge.phase(), BridgePhase::Exited);
    assert!(bridge.widget().is_none());
    let disposals = log
        .lock()
        .unwrap()
        .iter()
        .filter(|op| **op == WidgetOp::Dispose)
        .count();
    assert_eq!(disposals, 1);
    assert_eq!(exits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn teardown_while_spawning_lets_the_request_finish() {
    let backend = FakeBackend::new();
    let gate = backend.hold_spawn();
    let (mut bridge, log, exits) = bridge(&backend);
    bridge.spawn(cwd());
    tokio::task::yield_now().await;

    bridge.teardown();
    assert_eq!(backend.live(Topic::SessionOutput), 0);
    assert_eq!(backend.live(Topic::SessionExit), 0);
    assert!(log.lock().unwrap().contains(&WidgetOp::Dispose));

    gate.notify_one();
    tokio::time::timeout(WAIT, async {
        while backend.spawn_count() == 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
    assert_eq!(backend.emit_output("orphan"), 0);
    assert_eq!(backend.emit_exit(), 0);
    assert!(!writes(&log).contains(&"orphan".to_string()));
    assert_eq!(exits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn teardown_while_streaming_skips_exit_hook() {
    let backend = FakeBackend::new();
    let (mut bridge, log, exits) = streaming(&backend).await;
    bridge.teardown();

    assert_eq!(backend.live(Topic::SessionOutput), 0);
    assert_eq!(backend.live(Topic::SessionExit), 0);
    assert_eq!(backend.emit_exit(), 0);
    assert_eq!(exits.load(Ordering::SeqCst), 0);
    assert_eq!(log.lock().unwrap().last(), Some(&WidgetOp::Dispose));
}

#[tokio::test]
async fn dropping_the_bridge_tears_down() {
    let backend = FakeBackend::new();
    let (bridge, log, _) = streaming(&backend).await;
    drop(bridge);
    assert_eq!(backend.live(Topic::SessionOutput), 0);
    assert_eq!(log.lock().unwrap().last(), Some(&WidgetOp::Dispose));
}
