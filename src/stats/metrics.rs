//! Statistics for RTMP sessions

use std::time::Duration;

/// Session-level statistics
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Total bytes received from the transport
    pub bytes_received: u64,
    /// Payload bytes handed to the transport
    pub bytes_sent: u64,
    /// Connection duration
    pub duration: Duration,
    /// Audio/video messages accepted from a publisher
    pub media_received: u64,
    /// Ring packets sent to a subscriber
    pub packets_forwarded: u64,
    /// Ring packets discarded while paused
    pub dropped_while_paused: u64,
    /// Times the subscriber fell behind the ring
    pub lag_events: u64,
    /// Packets lost to lag
    pub packets_lagged: u64,
}

impl SessionStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&mut self, bytes: usize) {
        self.bytes_received += bytes as u64;
    }

    pub fn record_sent(&mut self, bytes: usize) {
        self.bytes_sent += bytes as u64;
    }

    pub fn record_lag(&mut self, skipped: u64) {
        self.lag_events += 1;
        self.packets_lagged += skipped;
    }

    /// Average inbound bitrate (bits/sec) over the connection
    pub fn receive_bitrate(&self) -> u64 {
        let secs = self.duration.as_secs();
        if secs > 0 {
            (self.bytes_received * 8) / secs
        } else {
            0
        }
    }
}

/// Server-wide statistics
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    /// Total connections ever accepted
    pub total_connections: u64,
    /// Current active connections
    pub active_connections: u64,
    /// Connections refused by the connection limit
    pub rejected_connections: u64,
    /// Streams currently published
    pub active_streams: u64,
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_stats_new() {
        let stats = SessionStats::new();
        assert_eq!(stats.bytes_received, 0);
        assert_eq!(stats.bytes_sent, 0);
        assert_eq!(stats.media_received, 0);
        assert_eq!(stats.packets_forwarded, 0);
        assert_eq!(stats.dropped_while_paused, 0);
        assert_eq!(stats.receive_bitrate(), 0);
    }

    #[test]
    fn test_session_stats_bitrate() {
        let mut stats = SessionStats::new();
        stats.record_received(1_000_000);
        stats.duration = Duration::from_secs(10);

        // 1,000,000 bytes * 8 bits / 10 seconds = 800,000 bps
        assert_eq!(stats.receive_bitrate(), 800_000);
    }

    #[test]
    fn test_session_stats_bitrate_zero_duration() {
        let mut stats = SessionStats::new();
        stats.record_received(1_000_000);

        assert_eq!(stats.receive_bitrate(), 0);
    }

    #[test]
    fn test_record_lag() {
        let mut stats = SessionStats::new();
        stats.record_lag(5);
        stats.record_lag(7);

        assert_eq!(stats.lag_events, 2);
        assert_eq!(stats.packets_lagged, 12);
    }

    #[test]
    fn test_server_stats_new() {
        let stats = ServerStats::new();
        assert_eq!(stats.total_connections, 0);
        assert_eq!(stats.active_connections, 0);
        assert_eq!(stats.rejected_connections, 0);
        assert_eq!(stats.active_streams, 0);
    }
}
