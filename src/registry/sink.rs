//! Write-side handle of a published stream

use std::sync::{Arc, Weak};

use super::source::{MediaSource, SourceListener};
use super::store::MediaRegistry;
use crate::amf::AmfValue;
use crate::protocol::RtmpPacket;

/// Owning handle through which a publisher feeds its source
///
/// Dropping the sink unregisters the source and closes its ring, so every
/// attached subscription observes `RingEvent::Detached` even while other
/// handles to the source are still held.
pub struct PublisherSink {
    source: Arc<MediaSource>,
    registry: Weak<MediaRegistry>,
}

impl PublisherSink {
    pub(super) fn new(source: Arc<MediaSource>, registry: Weak<MediaRegistry>) -> Self {
        Self { source, registry }
    }

    /// Push one packet into the bus; ownership moves into the ring
    pub fn write(&self, packet: RtmpPacket) {
        self.source.write(packet);
    }

    /// Replace the stream metadata
    pub fn set_metadata(&self, metadata: AmfValue) {
        self.source.set_metadata(metadata);
    }

    pub fn set_listener(&self, listener: Weak<dyn SourceListener>) {
        self.source.set_listener(listener);
    }

    pub fn source(&self) -> &Arc<MediaSource> {
        &self.source
    }

    pub fn reader_count(&self) -> usize {
        self.source.reader_count()
    }
}

impl Drop for PublisherSink {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(&self.source);
        }
        self.source.detach_all();
    }
}

impl std::fmt::Debug for PublisherSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublisherSink")
            .field("source", &self.source)
            .finish()
    }
}
