//! Published media sources
//!
//! A `MediaSource` exists for as long as its publisher holds the
//! [`PublisherSink`](super::PublisherSink). It keeps the latest metadata and
//! codec configuration packets for late joiners and fans every packet out
//! through a `tokio::sync::broadcast` ring. Unregistering the source closes
//! the ring even while other handles to the source are still alive.

use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;

use super::descriptor::{MediaDescriptor, StreamKey};
use super::ring::Subscription;
use crate::amf::AmfValue;
use crate::protocol::RtmpPacket;

/// Hooks a source forwards to whoever produces it
///
/// Implementations are called from arbitrary threads.
pub trait SourceListener: Send + Sync {
    /// Reposition playback; returns whether the seek was honoured
    fn seek_to(&self, _source: &MediaSource, _stamp_ms: u32) -> bool {
        false
    }

    /// Stop producing; returns whether the request was accepted
    fn close(&self, _source: &MediaSource, _force: bool) -> bool {
        false
    }

    /// The last reader detached
    fn on_none_reader(&self, _source: &MediaSource) {}
}

/// A live stream registered in the media bus
pub struct MediaSource {
    descriptor: MediaDescriptor,
    key: StreamKey,
    metadata: RwLock<AmfValue>,
    config_packets: RwLock<Vec<Arc<RtmpPacket>>>,
    ring: Mutex<Option<broadcast::Sender<Arc<RtmpPacket>>>>,
    listener: RwLock<Option<Weak<dyn SourceListener>>>,
    created_at: Instant,
}

impl MediaSource {
    pub(super) fn new(descriptor: MediaDescriptor, ring_capacity: usize) -> Self {
        let (ring, _) = broadcast::channel(ring_capacity);
        Self {
            key: descriptor.key(),
            descriptor,
            metadata: RwLock::new(AmfValue::object()),
            config_packets: RwLock::new(Vec::new()),
            ring: Mutex::new(Some(ring)),
            listener: RwLock::new(None),
            created_at: Instant::now(),
        }
    }

    pub fn descriptor(&self) -> &MediaDescriptor {
        &self.descriptor
    }

    pub fn key(&self) -> &StreamKey {
        &self.key
    }

    /// When the publisher registered
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Snapshot of the current metadata object
    pub fn metadata(&self) -> AmfValue {
        self.metadata.read().clone()
    }

    /// Codec configuration packets in the order they were first received
    pub fn config_packets(&self) -> Vec<Arc<RtmpPacket>> {
        self.config_packets.read().clone()
    }

    /// Number of attached subscriptions
    pub fn reader_count(&self) -> usize {
        self.ring
            .lock()
            .as_ref()
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Whether the ring still accepts readers
    pub fn is_attached(&self) -> bool {
        self.ring.lock().is_some()
    }

    /// Attach a new reader to the distribution ring
    ///
    /// The subscription only sees packets written after this call. Once the
    /// source is detached the subscription reports `RingEvent::Detached`
    /// straight away.
    pub fn attach_ring(self: &Arc<Self>) -> Subscription {
        let rx = match self.ring.lock().as_ref() {
            Some(ring) => ring.subscribe(),
            None => broadcast::channel(1).1,
        };
        let subscription = Subscription::new(rx, Arc::downgrade(self));
        tracing::debug!(
            stream = %self.key,
            readers = self.reader_count(),
            "Ring reader attached"
        );
        subscription
    }

    /// Install the producer hooks; held weakly so the source never keeps its producer alive
    pub fn set_listener(&self, listener: Weak<dyn SourceListener>) {
        *self.listener.write() = Some(listener);
    }

    fn listener(&self) -> Option<Arc<dyn SourceListener>> {
        self.listener.read().as_ref().and_then(Weak::upgrade)
    }

    /// Ask the producer to reposition
    pub fn seek_to(&self, stamp_ms: u32) -> bool {
        match self.listener() {
            Some(listener) => listener.seek_to(self, stamp_ms),
            None => false,
        }
    }

    /// Ask the producer to stop
    pub fn close(&self, force: bool) -> bool {
        match self.listener() {
            Some(listener) => listener.close(self, force),
            None => false,
        }
    }

    pub(super) fn set_metadata(&self, metadata: AmfValue) {
        *self.metadata.write() = metadata;
    }

    /// Cache configuration packets and fan the packet out
    pub(super) fn write(&self, packet: RtmpPacket) {
        let packet = Arc::new(packet);
        if packet.is_config() {
            let mut configs = self.config_packets.write();
            match configs
                .iter_mut()
                .find(|p| p.message_type == packet.message_type)
            {
                Some(slot) => *slot = Arc::clone(&packet),
                None => configs.push(Arc::clone(&packet)),
            }
        }
        if let Some(ring) = self.ring.lock().as_ref() {
            // Err only means nobody is attached right now
            let _ = ring.send(packet);
        }
    }

    /// Close the ring; every subscription sees `RingEvent::Detached`
    pub(super) fn detach_all(&self) {
        if self.ring.lock().take().is_some() {
            tracing::debug!(stream = %self.key, "Ring detached");
        }
    }

    pub(super) fn on_reader_detached(&self) {
        let readers = self.reader_count();
        tracing::debug!(stream = %self.key, readers = readers, "Ring reader detached");
        if readers == 0 {
            if let Some(listener) = self.listener() {
                listener.on_none_reader(self);
            }
        }
    }
}

impl std::fmt::Debug for MediaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaSource")
            .field("key", &self.key)
            .field("readers", &self.reader_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use bytes::Bytes;

    use super::*;
    use crate::protocol::constants::DEFAULT_VHOST;
    use crate::registry::RingEvent;

    fn source() -> Arc<MediaSource> {
        let descriptor = MediaDescriptor::parse("rtmp://127.0.0.1/live/test", DEFAULT_VHOST);
        Arc::new(MediaSource::new(descriptor, 16))
    }

    #[derive(Default)]
    struct Recorder {
        last_seek: AtomicU32,
        none_reader: AtomicU32,
    }

    impl SourceListener for Recorder {
        fn seek_to(&self, _source: &MediaSource, stamp_ms: u32) -> bool {
            self.last_seek.store(stamp_ms, Ordering::SeqCst);
            true
        }

        fn on_none_reader(&self, _source: &MediaSource) {
            self.none_reader.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_config_packets_replaced_per_type() {
        let src = source();
        src.write(RtmpPacket::video(0, Bytes::from_static(&[0x17, 0x00, 0x01])));
        src.write(RtmpPacket::audio(0, Bytes::from_static(&[0xAF, 0x00, 0x12])));
        src.write(RtmpPacket::video(40, Bytes::from_static(&[0x17, 0x01, 0x00])));
        src.write(RtmpPacket::video(80, Bytes::from_static(&[0x17, 0x00, 0x02])));

        let configs = src.config_packets();
        assert_eq!(configs.len(), 2);
        assert!(configs[0].is_video());
        assert_eq!(configs[0].payload[2], 0x02);
        assert!(configs[1].is_audio());
    }

    #[test]
    fn test_listener_hooks() {
        let src = source();
        assert!(!src.seek_to(10));

        let recorder = Arc::new(Recorder::default());
        let weak: Weak<dyn SourceListener> = Arc::downgrade(&recorder) as Weak<dyn SourceListener>;
        src.set_listener(weak);

        assert!(src.seek_to(1500));
        assert_eq!(recorder.last_seek.load(Ordering::SeqCst), 1500);

        let sub = src.attach_ring();
        assert_eq!(src.reader_count(), 1);
        drop(sub);
        assert_eq!(src.reader_count(), 0);
        assert_eq!(recorder.none_reader.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_is_weak() {
        let src = source();
        let recorder = Arc::new(Recorder::default());
        let weak: Weak<dyn SourceListener> = Arc::downgrade(&recorder) as Weak<dyn SourceListener>;
        src.set_listener(weak);
        drop(recorder);

        assert!(!src.seek_to(0));
    }

    #[test]
    fn test_detach_all_with_live_handles() {
        let src = source();
        let mut sub = src.attach_ring();
        src.detach_all();

        assert!(!src.is_attached());
        assert_eq!(src.reader_count(), 0);
        assert!(matches!(sub.try_recv(), Some(RingEvent::Detached)));

        src.write(RtmpPacket::video(0, Bytes::from_static(&[0x27, 0x01])));
        let mut late = src.attach_ring();
        assert!(matches!(late.try_recv(), Some(RingEvent::Detached)));
    }

    #[test]
    fn test_metadata_snapshot() {
        let src = source();
        src.set_metadata(AmfValue::object().with("width", 1280.0));
        assert_eq!(src.metadata().get_number("width"), Some(1280.0));
    }
}
