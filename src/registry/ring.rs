//! Read-side attachment to a source's distribution ring

use std::sync::{Arc, Weak};

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use super::source::MediaSource;
use crate::protocol::RtmpPacket;

/// What a subscription yields
#[derive(Debug, Clone)]
pub enum RingEvent {
    /// Next packet; shared with every other reader
    Packet(Arc<RtmpPacket>),
    /// This reader fell behind and missed `n` packets
    Lagged(u64),
    /// The source went away; no more packets will arrive
    Detached,
}

/// A consumer cursor on one source's ring
///
/// Holds the source weakly: a subscription never keeps a stream alive after
/// its publisher leaves. Dropping the subscription detaches it; no packet is
/// delivered through it afterwards.
pub struct Subscription {
    rx: Option<broadcast::Receiver<Arc<RtmpPacket>>>,
    source: Weak<MediaSource>,
    forwarding: bool,
}

impl Subscription {
    pub(super) fn new(rx: broadcast::Receiver<Arc<RtmpPacket>>, source: Weak<MediaSource>) -> Self {
        Self {
            rx: Some(rx),
            source,
            forwarding: true,
        }
    }

    /// Originating source, if it is still published
    pub fn source(&self) -> Option<Arc<MediaSource>> {
        self.source.upgrade()
    }

    /// Whether received packets should be forwarded (false while paused)
    pub fn is_forwarding(&self) -> bool {
        self.forwarding
    }

    /// Install or remove the forwarding path without detaching
    pub fn set_forwarding(&mut self, forwarding: bool) {
        self.forwarding = forwarding;
    }

    /// Wait for the next ring event
    pub async fn recv(&mut self) -> RingEvent {
        let Some(rx) = self.rx.as_mut() else {
            return std::future::pending().await;
        };
        match rx.recv().await {
            Ok(packet) => RingEvent::Packet(packet),
            Err(RecvError::Lagged(n)) => RingEvent::Lagged(n),
            Err(RecvError::Closed) => RingEvent::Detached,
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv); `None` when nothing is queued
    pub fn try_recv(&mut self) -> Option<RingEvent> {
        let rx = self.rx.as_mut()?;
        match rx.try_recv() {
            Ok(packet) => Some(RingEvent::Packet(packet)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Lagged(n)) => Some(RingEvent::Lagged(n)),
            Err(TryRecvError::Closed) => Some(RingEvent::Detached),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Release the receiver first so the source sees the new reader count
        drop(self.rx.take());
        if let Some(source) = self.source.upgrade() {
            source.on_reader_detached();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("forwarding", &self.forwarding)
            .field("attached", &(self.source.strong_count() > 0))
            .finish()
    }
}
