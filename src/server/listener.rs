//! RTMP server front
//!
//! Hands out session ids, enforces the connection limit and spawns one
//! [`Connection`] task per accepted peer. Socket accept, handshake and chunk
//! framing belong to the caller, which talks to each session through the
//! returned [`SessionHandle`].

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;

use crate::events::EventBus;
use crate::registry::MediaRegistry;
use crate::server::config::ServerConfig;
use crate::server::connection::{Connection, Inbound};
use crate::server::transport::{ChannelTransport, Outbound};
use crate::session::{CloseReason, Session, SessionConfig};
use crate::stats::ServerStats;

/// Caller's side of one running session
#[derive(Debug)]
pub struct SessionHandle {
    pub session_id: u64,
    /// Feed reassembled messages and byte counts here
    pub inbound: mpsc::Sender<Inbound>,
    /// Packets and socket instructions to apply, in order
    pub outbound: mpsc::UnboundedReceiver<Outbound>,
    /// Resolves with the close reason once the session ends
    pub join: JoinHandle<CloseReason>,
}

#[derive(Debug, Default)]
struct Counters {
    total: AtomicU64,
    active: AtomicU64,
    rejected: AtomicU64,
}

/// RTMP server
pub struct RtmpServer {
    config: ServerConfig,
    session_config: Arc<SessionConfig>,
    registry: Arc<MediaRegistry>,
    bus: Arc<EventBus>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
    counters: Arc<Counters>,
}

impl RtmpServer {
    /// Create a new server with its own media bus and event bus
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(MediaRegistry::with_config(config.registry.clone()));
        Self::with_shared(config, registry, Arc::new(EventBus::new()))
    }

    /// Create a server on an existing media bus and event bus
    pub fn with_shared(config: ServerConfig, registry: Arc<MediaRegistry>, bus: Arc<EventBus>) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            session_config: Arc::new(config.session.clone()),
            config,
            registry,
            bus,
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Get a reference to the stream registry
    pub fn registry(&self) -> &Arc<MediaRegistry> {
        &self.registry
    }

    /// Event bus for authorization and telemetry listeners
    pub fn events(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Start a session for a freshly handshaken peer
    ///
    /// Returns `None` when the connection limit is reached. Must be called
    /// from within a Tokio runtime.
    pub fn accept(&self, peer_addr: SocketAddr) -> Option<SessionHandle> {
        // Check connection limit
        let permit = match &self.connection_semaphore {
            Some(sem) => match Arc::clone(sem).try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return None;
                }
            },
            None => None,
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(session_id = session_id, peer = %peer_addr, "New connection");

        let (transport, outbound) = ChannelTransport::new();
        let session = Session::new(
            session_id,
            peer_addr,
            Arc::clone(&self.session_config),
            Arc::clone(&self.registry),
            Arc::clone(&self.bus),
            Box::new(transport),
        );
        let (inbound, inbound_rx) = mpsc::channel(self.config.inbound_capacity);
        let connection = Connection::new(session, inbound_rx, self.config.manage_interval);

        self.counters.total.fetch_add(1, Ordering::Relaxed);
        self.counters.active.fetch_add(1, Ordering::Relaxed);
        let counters = Arc::clone(&self.counters);

        let join = tokio::spawn(async move {
            let _permit = permit;
            let reason = connection.run().await;
            counters.active.fetch_sub(1, Ordering::Relaxed);
            tracing::debug!(session_id = session_id, reason = %reason, "Connection closed");
            reason
        });

        Some(SessionHandle {
            session_id,
            inbound,
            outbound,
            join,
        })
    }

    /// Snapshot of server counters
    pub fn stats(&self) -> ServerStats {
        ServerStats {
            total_connections: self.counters.total.load(Ordering::Relaxed),
            active_connections: self.counters.active.load(Ordering::Relaxed),
            rejected_connections: self.counters.rejected.load(Ordering::Relaxed),
            active_streams: self.registry.stream_count() as u64,
        }
    }
}

impl Default for RtmpServer {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::assert_ok;

    use super::*;
    use crate::session::testing::*;

    fn peer(port: u16) -> SocketAddr {
        SocketAddr::from(([192, 168, 1, 20], port))
    }

    #[tokio::test]
    async fn test_session_ids_are_unique() {
        let server = RtmpServer::default();
        let first = server.accept(peer(1000)).unwrap();
        let second = server.accept(peer(1001)).unwrap();

        assert_ne!(first.session_id, second.session_id);
        assert_eq!(server.stats().total_connections, 2);
        assert_eq!(server.stats().active_connections, 2);
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let server = RtmpServer::new(ServerConfig::default().max_connections(1));
        let first = server.accept(peer(1000)).unwrap();
        assert!(server.accept(peer(1001)).is_none());
        assert_eq!(server.stats().rejected_connections, 1);

        assert_ok!(first.inbound.send(Inbound::Closed).await);
        assert_eq!(first.join.await.unwrap(), CloseReason::PeerClosed);
        assert_eq!(server.stats().active_connections, 0);
        assert!(server.accept(peer(1002)).is_some());
    }

    #[tokio::test]
    async fn test_publish_through_server() {
        let server = RtmpServer::default();
        let mut handle = server.accept(peer(1000)).unwrap();

        for packet in [connect_packet("live"), create_stream_packet(), publish_packet("cam")] {
            assert_ok!(handle.inbound.send(Inbound::Message(packet)).await);
        }

        let mut described = Vec::new();
        while described.len() < 7 {
            if let Some(Outbound::Packet(packet)) = handle.outbound.recv().await {
                described.push(describe(&packet));
            }
        }
        assert_eq!(described[5], "_result");
        assert_eq!(described[6], "onStatus(NetStream.Publish.Start)");
        assert_eq!(server.stats().active_streams, 1);
        assert!(server.registry().find(&descriptor("cam")).is_some());
    }

    #[tokio::test]
    async fn test_shared_bus_sees_publish() {
        let registry = Arc::new(MediaRegistry::new());
        let bus = Arc::new(EventBus::new());
        let invokers = capture_invokers(&bus, crate::events::Topic::MediaPublish);
        let server = RtmpServer::with_shared(ServerConfig::default(), registry, bus);

        let handle = server.accept(peer(1000)).unwrap();
        for packet in [connect_packet("live"), create_stream_packet(), publish_packet("cam")] {
            assert_ok!(handle.inbound.send(Inbound::Message(packet)).await);
        }
        while invokers.lock().is_empty() {
            tokio::task::yield_now().await;
        }
        assert!(invokers.lock()[0].is_pending());
    }
}
