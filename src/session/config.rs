//! Session configuration

use std::time::Duration;

use crate::protocol::constants::DEFAULT_VHOST;

/// Per-session tuning; read-only once a session exists
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Publisher receive timeout, also used as the transport send timeout
    pub keep_alive: Duration,

    /// A session must publish or play within this time
    pub handshake_timeout: Duration,

    /// Flow reports are only emitted above this many received bytes
    pub flow_threshold_bytes: u64,

    /// Replace publisher timestamps with locally measured time
    pub modify_stamp: bool,

    /// Vhost used when the URL names none (or an IP address)
    pub default_vhost: String,

    /// Chunk size advertised on connect
    pub chunk_size: u32,

    /// Window acknowledgement size advertised on connect
    pub window_ack_size: u32,

    /// Peer bandwidth advertised on connect
    pub peer_bandwidth: u32,

    /// Receive buffer requested for every new connection
    pub initial_recv_buffer: usize,

    /// Receive buffer requested once a session publishes
    pub publisher_recv_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            keep_alive: Duration::from_secs(15),
            handshake_timeout: Duration::from_secs(15),
            flow_threshold_bytes: 1024 * 1024,
            modify_stamp: false,
            default_vhost: DEFAULT_VHOST.to_string(),
            chunk_size: 60000,
            window_ack_size: 5_000_000,
            peer_bandwidth: 5_000_000,
            initial_recv_buffer: 4 * 1024,
            publisher_recv_buffer: 256 * 1024,
        }
    }
}

impl SessionConfig {
    /// Set the publisher keep-alive
    pub fn keep_alive(mut self, timeout: Duration) -> Self {
        self.keep_alive = timeout;
        self
    }

    /// Set the publish/play deadline
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the flow report threshold in bytes
    pub fn flow_threshold(mut self, bytes: u64) -> Self {
        self.flow_threshold_bytes = bytes;
        self
    }

    /// Rewrite ingest timestamps from the local clock
    pub fn modify_stamp(mut self, enabled: bool) -> Self {
        self.modify_stamp = enabled;
        self
    }

    pub fn default_vhost(mut self, vhost: impl Into<String>) -> Self {
        self.default_vhost = vhost.into();
        self
    }

    /// Set the advertised chunk size (1..=0x7FFFFFFF)
    pub fn chunk_size(mut self, size: u32) -> Self {
        self.chunk_size = size.clamp(1, 0x7FFF_FFFF);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();

        assert_eq!(config.keep_alive, Duration::from_secs(15));
        assert_eq!(config.handshake_timeout, Duration::from_secs(15));
        assert_eq!(config.flow_threshold_bytes, 1024 * 1024);
        assert!(!config.modify_stamp);
        assert_eq!(config.default_vhost, DEFAULT_VHOST);
        assert_eq!(config.chunk_size, 60000);
        assert_eq!(config.window_ack_size, 5_000_000);
        assert_eq!(config.peer_bandwidth, 5_000_000);
    }

    #[test]
    fn test_builder_chaining() {
        let config = SessionConfig::default()
            .keep_alive(Duration::from_secs(5))
            .handshake_timeout(Duration::from_secs(3))
            .flow_threshold(0)
            .modify_stamp(true)
            .default_vhost("example.com")
            .chunk_size(0);

        assert_eq!(config.keep_alive, Duration::from_secs(5));
        assert_eq!(config.handshake_timeout, Duration::from_secs(3));
        assert_eq!(config.flow_threshold_bytes, 0);
        assert!(config.modify_stamp);
        assert_eq!(config.default_vhost, "example.com");
        assert_eq!(config.chunk_size, 1);
    }
}
