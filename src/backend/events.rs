//! In-process event bus carrying backend events to subscribers.
//!
//! Each subscriber gets its own unbounded queue, so a single emitter's
//! events arrive in emission order, exactly once. Events emitted while a
//! topic has no subscribers are dropped.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    SessionOutput,
    SessionExit,
    InstallProgress,
}

impl Topic {
    pub fn name(self) -> &'static str {
        match self {
            Topic::SessionOutput => "session-output",
            Topic::SessionExit => "session-exit",
            Topic::InstallProgress => "install-progress",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    /// A chunk of session output.
    Output(String),
    /// The session process has gone away.
    Exit,
    /// One line of installer output.
    InstallProgress(String),
}

impl BackendEvent {
    pub fn topic(&self) -> Topic {
        match self {
            BackendEvent::Output(_) => Topic::SessionOutput,
            BackendEvent::Exit => Topic::SessionExit,
            BackendEvent::InstallProgress(_) => Topic::InstallProgress,
        }
    }
}

struct Subscriber {
    id: u64,
    topic: Topic,
    tx: mpsc::UnboundedSender<BackendEvent>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: Vec<Subscriber>,
}

#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.lock();
        f.debug_struct("EventBus")
            .field("subscribers", &registry.subscribers.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start listening on `topic`. The returned subscription must be
    /// released with [`Subscription::release`].
    pub fn subscribe(&self, topic: Topic) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut registry = self.lock();
        registry.next_id += 1;
        let id = registry.next_id;
        registry.subscribers.push(Subscriber { id, topic, tx });
        tracing::debug!(%topic, id, "subscribed");
        Subscription {
            id,
            topic,
            rx,
            bus: self.clone(),
            released: false,
        }
    }

    /// Deliver `event` to every live subscriber of its topic.
    /// Returns the number of subscribers that received it.
    pub fn emit(&self, event: BackendEvent) -> usize {
        let topic = event.topic();
        let mut registry = self.lock();
        registry.subscribers.retain(|s| !s.tx.is_closed());
        let mut delivered = 0;
        for subscriber in registry.subscribers.iter().filter(|s| s.topic == topic) {
            if subscriber.tx.send(event.clone()).is_ok() {
                delivered += 1;
            }
        }
        if delivered == 0 {
            tracing::trace!(%topic, "event dropped, no listeners");
        }
        delivered
    }

    pub fn live_subscriptions(&self, topic: Topic) -> usize {
        self.lock()
            .subscribers
            .iter()
            .filter(|s| s.topic == topic)
            .count()
    }

    fn unsubscribe(&self, id: u64) {
        self.lock().subscribers.retain(|s| s.id != id);
    }
}

/// A live registration on the [`EventBus`].
///
/// The only way to end a subscription is [`Subscription::release`]; a
/// subscription dropped without release is still unregistered, with a
/// warning.
pub struct Subscription {
    id: u64,
    topic: Topic,
    rx: mpsc::UnboundedReceiver<BackendEvent>,
    bus: EventBus,
    released: bool,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Wait for the next event. Cancel-safe.
    pub async fn recv(&mut self) -> Option<BackendEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<BackendEvent> {
        self.rx.try_recv().ok()
    }

    /// Unregister from the bus. Events still queued are discarded.
    pub fn release(mut self) {
        self.bus.unsubscribe(self.id);
        self.released = true;
        tracing::debug!(topic = %self.topic, id = self.id, "released");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.released {
            tracing::warn!(topic = %self.topic, id = self.id, "subscription dropped without release");
            self.bus.unsubscribe(self.id);
        }
    }
}
