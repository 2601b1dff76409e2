//! Session identity shared with event listeners

use std::net::SocketAddr;

/// Read-only view of a session handed to bus listeners
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Unique session ID
    pub session_id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Application name (from connect)
    pub app: String,

    /// `tcUrl` from connect, or the default one built from the app
    pub tc_url: String,

    /// AMF encoding the client announced on connect
    pub object_encoding: f64,
}

impl SessionContext {
    /// Create a new context
    pub fn new(session_id: u64, peer_addr: SocketAddr) -> Self {
        Self {
            session_id,
            peer_addr,
            app: String::new(),
            tc_url: String::new(),
            object_encoding: 0.0,
        }
    }

    /// Whether the peer has sent `connect`
    pub fn is_connected(&self) -> bool {
        !self.tc_url.is_empty()
    }
}
