//! Channel-backed transport
//!
//! Sessions never touch sockets. `ChannelTransport` turns every transport
//! call into an [`Outbound`] item for the writer task that owns the socket
//! and the chunk encoder.

use std::io;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::protocol::RtmpPacket;
use crate::session::{CloseReason, Transport, WriteMode};

/// Instruction for the connection's writer
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Chunk and write this message
    Packet(RtmpPacket),
    /// Resize the socket receive buffer
    ReceiveBuffer(usize),
    /// Apply a socket send timeout
    SendTimeout(Duration),
    /// Switch write coalescing
    WriteMode(WriteMode),
    /// Flush and close the socket
    Close(CloseReason),
}

/// [`Transport`] that forwards to an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn push(&self, item: Outbound) -> bool {
        self.tx.send(item).is_ok()
    }
}

impl Transport for ChannelTransport {
    fn send(&mut self, packet: RtmpPacket) -> io::Result<()> {
        if self.push(Outbound::Packet(packet)) {
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "writer closed"))
        }
    }

    fn set_receive_buffer_size(&mut self, size: usize) {
        self.push(Outbound::ReceiveBuffer(size));
    }

    fn set_send_timeout(&mut self, timeout: Duration) {
        self.push(Outbound::SendTimeout(timeout));
    }

    fn set_write_mode(&mut self, mode: WriteMode) {
        self.push(Outbound::WriteMode(mode));
    }

    fn close(&mut self, reason: &CloseReason) {
        self.push(Outbound::Close(reason.clone()));
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn test_forwards_in_order() {
        let (mut transport, mut rx) = ChannelTransport::new();
        transport.set_write_mode(WriteMode::Bulk);
        transport
            .send(RtmpPacket::audio(7, Bytes::from_static(&[0xAF, 0x01])))
            .unwrap();
        transport.close(&CloseReason::PeerClosed);

        assert_eq!(rx.try_recv().unwrap(), Outbound::WriteMode(WriteMode::Bulk));
        assert!(matches!(rx.try_recv().unwrap(), Outbound::Packet(p) if p.timestamp == 7));
        assert_eq!(
            rx.try_recv().unwrap(),
            Outbound::Close(CloseReason::PeerClosed)
        );
    }

    #[test]
    fn test_send_after_writer_gone() {
        let (mut transport, rx) = ChannelTransport::new();
        drop(rx);

        let err = transport
            .send(RtmpPacket::video(0, Bytes::new()))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
