//! Timestamp handling for both directions of the media path
//!
//! Outbound packets are rebased per channel so every subscriber sees
//! zero-based, non-decreasing timestamps. Inbound packets may optionally be
//! restamped from the local clock when a publisher's clock is not trusted.

use tokio::time::Instant;

use crate::protocol::RtmpPacket;

/// Per-channel zero-basing of outgoing timestamps
///
/// Channels are selected by message-type parity. A timestamp below the
/// channel baseline clears both baselines and is emitted as 0.
#[derive(Debug, Clone, Default)]
pub struct TimestampNormalizer {
    first: [Option<u32>; 2],
}

impl TimestampNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timestamp to put on the wire for `packet`; the packet is not touched
    pub fn normalize(&mut self, packet: &RtmpPacket) -> u32 {
        self.normalize_stamp(packet.channel(), packet.timestamp)
    }

    fn normalize_stamp(&mut self, channel: usize, stamp: u32) -> u32 {
        let first = *self.first[channel].get_or_insert(stamp);
        if stamp >= first {
            stamp - first
        } else {
            // Rollback or wrap: re-baseline both channels
            self.first = [None, None];
            0
        }
    }

    pub fn reset(&mut self) {
        self.first = [None, None];
    }
}

/// Local-clock replacement for publisher timestamps
#[derive(Debug, Clone)]
pub struct IngestStamper {
    started: [Instant; 2],
}

impl IngestStamper {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            started: [now, now],
        }
    }

    /// Milliseconds since this stamper was created, on the packet's channel
    pub fn stamp(&self, packet: &RtmpPacket) -> u32 {
        let elapsed = self.started[packet.channel()].elapsed().as_millis();
        u32::try_from(elapsed).unwrap_or(u32::MAX)
    }
}

impl Default for IngestStamper {
    fn default() -> Self {
        Self::new()
    }
}
