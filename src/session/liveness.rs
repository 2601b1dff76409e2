//! Liveness checks driven by the periodic manager tick

use std::time::Duration;

use tokio::time::Instant;

use super::CloseReason;

/// Tracks connection age and inbound activity
#[derive(Debug, Clone)]
pub struct LivenessMonitor {
    connected_at: Instant,
    last_recv: Instant,
}

impl LivenessMonitor {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            connected_at: now,
            last_recv: now,
        }
    }

    /// Record inbound data
    pub fn touch(&mut self) {
        self.last_recv = Instant::now();
    }

    /// Time since the connection was accepted
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Time since the last inbound data
    pub fn idle(&self) -> Duration {
        self.last_recv.elapsed()
    }

    /// Decide whether the session has to go
    ///
    /// A session without a role is dropped once `handshake_timeout` has
    /// passed since it connected; a publisher is dropped once it has been
    /// silent for `keep_alive`. Subscribers are never timed out here.
    pub fn check(
        &self,
        has_role: bool,
        is_publisher: bool,
        handshake_timeout: Duration,
        keep_alive: Duration,
    ) -> Option<CloseReason> {
        if !has_role && self.age() > handshake_timeout {
            return Some(CloseReason::HandshakeTimeout);
        }
        if is_publisher && self.idle() > keep_alive {
            return Some(CloseReason::ReceiveTimeout);
        }
        None
    }
}

impl Default for LivenessMonitor {
    fn default() -> Self {
        Self::new()
    }
}
