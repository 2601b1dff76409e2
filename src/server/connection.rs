//! Async driver for one session
//!
//! Multiplexes the chunk parser's output, the session's own task queue and
//! ring, and the liveness ticker onto a single task so the session is only
//! ever touched from one place.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::protocol::RtmpPacket;
use crate::session::{CloseReason, Flow, Session};

/// Input from the connection's reader
#[derive(Debug)]
pub enum Inbound {
    /// Bytes consumed from the socket
    Received(usize),
    /// One reassembled message
    Message(RtmpPacket),
    /// The peer closed the socket
    Closed,
}

/// Drives a [`Session`] until it closes
pub struct Connection {
    session: Session,
    inbound: mpsc::Receiver<Inbound>,
    manage_interval: Duration,
}

impl Connection {
    pub fn new(session: Session, inbound: mpsc::Receiver<Inbound>, manage_interval: Duration) -> Self {
        Self {
            session,
            inbound,
            manage_interval,
        }
    }

    /// Run until the session closes and return why
    pub async fn run(mut self) -> CloseReason {
        let session_id = self.session.id();
        let mut ticker = tokio::time::interval(self.manage_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            let flow = tokio::select! {
                inbound = self.inbound.recv() => match inbound {
                    Some(Inbound::Received(bytes)) => {
                        self.session.on_recv(bytes);
                        Flow::Continue
                    }
                    Some(Inbound::Message(packet)) => self.session.on_message(packet),
                    Some(Inbound::Closed) | None => {
                        self.session.shutdown(CloseReason::PeerClosed);
                        Flow::Close(CloseReason::PeerClosed)
                    }
                },
                flow = self.session.drive() => flow,
                _ = ticker.tick() => self.session.on_manager(),
            };

            if flow.is_close() {
                let reason = self
                    .session
                    .close_reason()
                    .cloned()
                    .unwrap_or(CloseReason::PeerClosed);
                tracing::debug!(
                    session_id = session_id,
                    reason = %reason,
                    "Connection finished"
                );
                return reason;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use tokio_test::assert_ok;

    use super::*;
    use crate::server::transport::{ChannelTransport, Outbound};
    use crate::session::testing::*;

    fn spawn_connection(
        harness: &Harness,
        id: u64,
    ) -> (
        mpsc::Sender<Inbound>,
        mpsc::UnboundedReceiver<Outbound>,
        tokio::task::JoinHandle<CloseReason>,
    ) {
        let (transport, outbound) = ChannelTransport::new();
        let session = Session::new(
            id,
            peer_addr(),
            Arc::clone(&harness.config),
            Arc::clone(&harness.registry),
            Arc::clone(&harness.bus),
            Box::new(transport),
        );
        let (tx, rx) = mpsc::channel(16);
        let join = tokio::spawn(Connection::new(session, rx, Duration::from_secs(2)).run());
        (tx, outbound, join)
    }

    async fn next_packet(outbound: &mut mpsc::UnboundedReceiver<Outbound>) -> RtmpPacket {
        loop {
            match outbound.recv().await {
                Some(Outbound::Packet(packet)) => return packet,
                Some(_) => continue,
                None => panic!("writer channel closed"),
            }
        }
    }

    async fn expect_status(outbound: &mut mpsc::UnboundedReceiver<Outbound>, code: &str) {
        let wanted = format!("onStatus({})", code);
        loop {
            if describe(&next_packet(outbound).await) == wanted {
                return;
            }
        }
    }

    #[tokio::test]
    async fn test_peer_close_ends_connection() {
        let harness = Harness::new();
        let (tx, mut outbound, join) = spawn_connection(&harness, 1);

        assert_ok!(tx.send(Inbound::Message(connect_packet("live"))).await);
        assert_eq!(describe(&next_packet(&mut outbound).await), "chunk-size");

        assert_ok!(tx.send(Inbound::Closed).await);
        assert_eq!(join.await.unwrap(), CloseReason::PeerClosed);
    }

    #[tokio::test]
    async fn test_media_flows_from_publisher_to_player() {
        let harness = Harness::new();
        let (pub_tx, mut pub_out, _pub_join) = spawn_connection(&harness, 1);
        let (play_tx, mut play_out, _play_join) = spawn_connection(&harness, 2);

        for packet in [
            connect_packet("live"),
            create_stream_packet(),
            publish_packet("cam"),
        ] {
            assert_ok!(pub_tx.send(Inbound::Message(packet)).await);
        }
        expect_status(&mut pub_out, "NetStream.Publish.Start").await;

        for packet in [
            connect_packet("live"),
            create_stream_packet(),
            play_packet("cam"),
        ] {
            assert_ok!(play_tx.send(Inbound::Message(packet)).await);
        }
        expect_status(&mut play_out, "NetStream.Play.PublishNotify").await;
        assert_eq!(describe(&next_packet(&mut play_out).await), "data:onMetaData");

        for ts in [3000, 3040] {
            let frame = RtmpPacket::video(ts, Bytes::from_static(&[0x27, 0x01, 0x00]));
            assert_ok!(pub_tx.send(Inbound::Message(frame)).await);
        }
        assert_eq!(describe(&next_packet(&mut play_out).await), "video@0");
        assert_eq!(describe(&next_packet(&mut play_out).await), "video@40");
    }

    #[tokio::test]
    async fn test_unpublish_detaches_player() {
        let harness = Harness::new();
        let (pub_tx, mut pub_out, pub_join) = spawn_connection(&harness, 1);
        let (play_tx, mut play_out, play_join) = spawn_connection(&harness, 2);

        for packet in [connect_packet("live"), create_stream_packet(), publish_packet("cam")] {
            assert_ok!(pub_tx.send(Inbound::Message(packet)).await);
        }
        expect_status(&mut pub_out, "NetStream.Publish.Start").await;
        for packet in [connect_packet("live"), create_stream_packet(), play_packet("cam")] {
            assert_ok!(play_tx.send(Inbound::Message(packet)).await);
        }
        expect_status(&mut play_out, "NetStream.Play.Start").await;

        let delete = command_on(1, "deleteStream", 5.0, &[crate::amf::AmfValue::Null]);
        assert_ok!(pub_tx.send(Inbound::Message(delete)).await);

        assert_eq!(pub_join.await.unwrap(), CloseReason::Unpublished);
        assert_eq!(play_join.await.unwrap(), CloseReason::RingDetached);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_connection_times_out() {
        let harness = Harness::new();
        let (tx, _outbound, join) = spawn_connection(&harness, 1);

        assert_ok!(tx.send(Inbound::Message(connect_packet("live"))).await);
        assert_eq!(join.await.unwrap(), CloseReason::HandshakeTimeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_kicked_publisher_connection_ends() {
        let harness = Harness::new();
        let (tx, mut outbound, join) = spawn_connection(&harness, 1);
        for packet in [connect_packet("live"), create_stream_packet(), publish_packet("cam")] {
            assert_ok!(tx.send(Inbound::Message(packet)).await);
        }
        expect_status(&mut outbound, "NetStream.Publish.Start").await;

        assert!(harness.registry.close_stream(&descriptor("cam"), false).unwrap());
        assert!(matches!(join.await.unwrap(), CloseReason::Kicked(_)));
        assert!(harness.registry.find(&descriptor("cam")).is_none());
    }
}
