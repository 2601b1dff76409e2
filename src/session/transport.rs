//! Boundary between the session and the byte stream it runs on
//!
//! Chunk framing, socket I/O and write coalescing live behind this trait;
//! the session only hands over whole messages and tuning hints.

use std::io;
use std::time::Duration;

use super::CloseReason;
use crate::protocol::RtmpPacket;

/// Write coalescing preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Flush each message immediately (TCP_NODELAY)
    #[default]
    LowLatency,
    /// Coalesce writes for throughput; used once a subscriber starts playing
    Bulk,
}

/// Outbound side of one connection
pub trait Transport: Send {
    /// Queue one message for the peer
    fn send(&mut self, packet: RtmpPacket) -> io::Result<()>;

    /// Resize the receive buffer
    fn set_receive_buffer_size(&mut self, size: usize);

    /// Give up on a blocked write after `timeout`
    fn set_send_timeout(&mut self, timeout: Duration);

    fn set_write_mode(&mut self, mode: WriteMode);

    /// Tear down the connection; called exactly once per session
    fn close(&mut self, reason: &CloseReason);
}
