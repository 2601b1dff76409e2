//! Server configuration

use std::time::Duration;

use crate::registry::RegistryConfig;
use crate::session::SessionConfig;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Period of the liveness check run on every connection
    pub manage_interval: Duration,

    /// Messages buffered from the chunk parser before it is back-pressured
    pub inbound_capacity: usize,

    /// Settings handed to every session
    pub session: SessionConfig,

    /// Media bus settings
    pub registry: RegistryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_connections: 0, // Unlimited
            manage_interval: Duration::from_secs(2),
            inbound_capacity: 256,
            session: SessionConfig::default(),
            registry: RegistryConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the liveness check period
    pub fn manage_interval(mut self, interval: Duration) -> Self {
        self.manage_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Set the inbound queue depth (at least one message)
    pub fn inbound_capacity(mut self, capacity: usize) -> Self {
        self.inbound_capacity = capacity.max(1);
        self
    }

    /// Replace the session settings
    pub fn session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Replace the media bus settings
    pub fn registry(mut self, registry: RegistryConfig) -> Self {
        self.registry = registry;
        self
    }

    /// Set the publisher keep-alive
    pub fn keep_alive(mut self, timeout: Duration) -> Self {
        self.session = self.session.keep_alive(timeout);
        self
    }
}
