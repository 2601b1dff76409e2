//! Process-wide event bus
//!
//! Sessions announce publish/play intents, flow reports and "no reader"
//! notices here. Applications hook in by registering listeners per
//! [`Topic`]; authorization listeners answer through the [`AuthInvoker`]
//! carried by the event, from any thread and at any later time.
//!
//! ```no_run
//! use std::sync::Arc;
//! use rtmp_session::events::{BusEvent, EventBus, Topic};
//!
//! let bus = EventBus::new();
//! bus.add_listener(Topic::MediaPublish, Arc::new(|event: &BusEvent| {
//!     if let BusEvent::MediaPublish(request) = event {
//!         let _ = match request.descriptor.param("token") {
//!             Some("secret") => request.invoker.allow(),
//!             _ => request.invoker.deny("bad token"),
//!         };
//!     }
//! }));
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use crate::registry::MediaDescriptor;
use crate::session::SessionContext;

/// Event categories listeners subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// A session asks to publish; answer through the invoker
    MediaPublish,
    /// A session asks to play; answer through the invoker
    MediaPlayed,
    /// Traffic summary of a closed session
    FlowReport,
    /// The last reader of a published stream left
    StreamNoneReader,
}

/// Payload delivered to listeners
#[derive(Debug, Clone)]
pub enum BusEvent {
    MediaPublish(AuthRequest),
    MediaPlayed(AuthRequest),
    FlowReport(FlowReport),
    StreamNoneReader(MediaDescriptor),
}

impl BusEvent {
    pub fn topic(&self) -> Topic {
        match self {
            BusEvent::MediaPublish(_) => Topic::MediaPublish,
            BusEvent::MediaPlayed(_) => Topic::MediaPlayed,
            BusEvent::FlowReport(_) => Topic::FlowReport,
            BusEvent::StreamNoneReader(_) => Topic::StreamNoneReader,
        }
    }
}

/// Publish or play authorization request
#[derive(Debug, Clone)]
pub struct AuthRequest {
    /// Stream the session wants to publish or play
    pub descriptor: MediaDescriptor,
    /// Requesting session
    pub session: SessionContext,
    /// Verdict channel; empty string grants, anything else is the denial reason
    pub invoker: AuthInvoker,
}

/// Traffic summary emitted when a session closes
#[derive(Debug, Clone)]
pub struct FlowReport {
    pub descriptor: MediaDescriptor,
    /// Bytes received over the lifetime of the connection
    pub total_bytes: u64,
    /// How long the connection was open
    pub duration: Duration,
    /// True unless the session ever published
    pub is_player: bool,
    pub session: SessionContext,
}

type Continuation = Box<dyn FnOnce(String) + Send>;

/// Exactly-once verdict continuation
///
/// Clones share the same slot: whichever clone is invoked first delivers the
/// verdict, every later call is ignored.
#[derive(Clone)]
pub struct AuthInvoker {
    slot: Arc<Mutex<Option<Continuation>>>,
}

impl AuthInvoker {
    pub fn new<F>(continuation: F) -> Self
    where
        F: FnOnce(String) + Send + 'static,
    {
        Self {
            slot: Arc::new(Mutex::new(Some(Box::new(continuation)))),
        }
    }

    /// Deliver a verdict; returns false if one was already delivered
    pub fn invoke(&self, err: impl Into<String>) -> bool {
        let continuation = self.slot.lock().take();
        match continuation {
            Some(continuation) => {
                continuation(err.into());
                true
            }
            None => false,
        }
    }

    /// Grant the request
    pub fn allow(&self) -> bool {
        self.invoke(String::new())
    }

    /// Deny the request with a reason shown to the peer
    pub fn deny(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        if reason.is_empty() {
            return self.invoke("denied");
        }
        self.invoke(reason)
    }

    pub fn is_pending(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl std::fmt::Debug for AuthInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthInvoker")
            .field("pending", &self.is_pending())
            .finish()
    }
}

/// Listener callback
pub type Listener = Arc<dyn Fn(&BusEvent) + Send + Sync>;

/// Handle returned by [`EventBus::add_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Topic-keyed broadcast of session events
pub struct EventBus {
    listeners: RwLock<HashMap<Topic, Vec<(ListenerId, Listener)>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn add_listener(&self, topic: Topic, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .entry(topic)
            .or_default()
            .push((id, listener));
        id
    }

    /// Remove a listener; returns whether it was registered
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        for entries in listeners.values_mut() {
            if let Some(pos) = entries.iter().position(|(entry, _)| *entry == id) {
                entries.remove(pos);
                return true;
            }
        }
        false
    }

    pub fn listener_count(&self, topic: Topic) -> usize {
        self.listeners.read().get(&topic).map_or(0, Vec::len)
    }

    /// Deliver an event to every listener of its topic
    ///
    /// Returns whether at least one listener was registered. Listeners run
    /// on the caller's thread, outside the bus lock.
    pub fn emit(&self, event: &BusEvent) -> bool {
        let listeners: Vec<Listener> = match self.listeners.read().get(&event.topic()) {
            Some(entries) => entries.iter().map(|(_, l)| Arc::clone(l)).collect(),
            None => Vec::new(),
        };
        if listeners.is_empty() {
            return false;
        }

        tracing::trace!(topic = ?event.topic(), listeners = listeners.len(), "Emitting event");
        for listener in &listeners {
            listener(event);
        }
        true
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners.read();
        f.debug_struct("EventBus")
            .field("topics", &listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::protocol::constants::DEFAULT_VHOST;

    fn request(invoker: AuthInvoker) -> AuthRequest {
        let addr: SocketAddr = "127.0.0.1:50000".parse().unwrap();
        AuthRequest {
            descriptor: MediaDescriptor::parse("rtmp://127.0.0.1/live/a", DEFAULT_VHOST),
            session: SessionContext::new(1, addr),
            invoker,
        }
    }

    #[test]
    fn test_invoker_runs_once() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&calls);
        let invoker = AuthInvoker::new(move |err| seen.lock().push(err));
        let clone = invoker.clone();

        assert!(clone.deny("no"));
        assert!(!invoker.allow());
        assert!(!invoker.is_pending());
        assert_eq!(*calls.lock(), vec!["no".to_string()]);
    }

    #[test]
    fn test_deny_never_grants() {
        let verdict = Arc::new(Mutex::new(None));
        let seen = Arc::clone(&verdict);
        let invoker = AuthInvoker::new(move |err| *seen.lock() = Some(err));

        invoker.deny("");
        assert_eq!(verdict.lock().as_deref(), Some("denied"));
    }

    #[test]
    fn test_emit_without_listeners() {
        let bus = EventBus::new();
        let invoker = AuthInvoker::new(|_| {});
        assert!(!bus.emit(&BusEvent::MediaPublish(request(invoker))));
    }

    #[test]
    fn test_emit_per_topic() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        let id = bus.add_listener(
            Topic::MediaPlayed,
            Arc::new(move |event: &BusEvent| {
                if let BusEvent::MediaPlayed(req) = event {
                    req.invoker.allow();
                }
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert!(!bus.emit(&BusEvent::MediaPublish(request(AuthInvoker::new(|_| {})))));
        assert!(bus.emit(&BusEvent::MediaPlayed(request(AuthInvoker::new(|_| {})))));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert!(bus.remove_listener(id));
        assert!(!bus.remove_listener(id));
        assert_eq!(bus.listener_count(Topic::MediaPlayed), 0);
    }

    #[test]
    fn test_listener_may_register_during_emit() {
        let bus = Arc::new(EventBus::new());
        let inner = Arc::clone(&bus);
        bus.add_listener(
            Topic::StreamNoneReader,
            Arc::new(move |_: &BusEvent| {
                inner.add_listener(Topic::FlowReport, Arc::new(|_: &BusEvent| {}));
            }),
        );

        let descriptor = MediaDescriptor::parse("rtmp://127.0.0.1/live/a", DEFAULT_VHOST);
        assert!(bus.emit(&BusEvent::StreamNoneReader(descriptor)));
        assert_eq!(bus.listener_count(Topic::FlowReport), 1);
    }
}
