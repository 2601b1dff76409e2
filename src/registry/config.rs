//! Registry configuration

use std::time::Duration;

/// Media bus tuning
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Packets buffered per source ring before slow readers start lagging
    pub ring_capacity: usize,

    /// How long a play lookup waits for a publisher to appear (zero = answer immediately)
    pub stream_wait_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            ring_capacity: 512,
            stream_wait_timeout: Duration::from_secs(5),
        }
    }
}

impl RegistryConfig {
    /// Set the ring capacity (at least one packet)
    pub fn ring_capacity(mut self, capacity: usize) -> Self {
        self.ring_capacity = capacity.max(1);
        self
    }

    /// Set the play lookup wait
    pub fn stream_wait_timeout(mut self, timeout: Duration) -> Self {
        self.stream_wait_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = RegistryConfig::default()
            .ring_capacity(0)
            .stream_wait_timeout(Duration::ZERO);

        assert_eq!(config.ring_capacity, 1);
        assert_eq!(config.stream_wait_timeout, Duration::ZERO);
    }
}
