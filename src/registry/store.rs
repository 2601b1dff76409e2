//! Media source registry
//!
//! The process-wide table of published sources. Lookups are synchronous and
//! lock-light (`parking_lot::RwLock`); no lock is ever held across an await.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::config::RegistryConfig;
use super::descriptor::{MediaDescriptor, StreamKey};
use super::error::RegistryError;
use super::sink::PublisherSink;
use super::source::MediaSource;

/// Central registry for all published streams
pub struct MediaRegistry {
    sources: RwLock<HashMap<StreamKey, Arc<MediaSource>>>,
    registered: Notify,
    config: RegistryConfig,
}

impl MediaRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            sources: RwLock::new(HashMap::new()),
            registered: Notify::new(),
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a publisher for a descriptor
    ///
    /// Fails if the stream already has a publisher.
    pub fn register_publisher(
        self: &Arc<Self>,
        descriptor: &MediaDescriptor,
    ) -> Result<PublisherSink, RegistryError> {
        let key = descriptor.key();
        let source = {
            let mut sources = self.sources.write();
            if sources.contains_key(&key) {
                return Err(RegistryError::StreamAlreadyPublishing(key));
            }
            let source = Arc::new(MediaSource::new(
                descriptor.clone(),
                self.config.ring_capacity,
            ));
            sources.insert(key.clone(), Arc::clone(&source));
            source
        };

        self.registered.notify_waiters();
        tracing::info!(stream = %key, "Publisher registered");

        Ok(PublisherSink::new(source, Arc::downgrade(self)))
    }

    /// Remove a source, only if it is still the registered one for its key
    pub(super) fn unregister(&self, source: &Arc<MediaSource>) {
        let mut sources = self.sources.write();
        let is_current = sources
            .get(source.key())
            .is_some_and(|current| Arc::ptr_eq(current, source));
        if is_current {
            sources.remove(source.key());
            tracing::info!(
                stream = %source.key(),
                readers = source.reader_count(),
                "Publisher unregistered"
            );
        }
    }

    /// Find a published source
    pub fn find(&self, descriptor: &MediaDescriptor) -> Option<Arc<MediaSource>> {
        self.find_key(&descriptor.key())
    }

    fn find_key(&self, key: &StreamKey) -> Option<Arc<MediaSource>> {
        self.sources.read().get(key).cloned()
    }

    /// Wait up to `timeout` for a source to be published
    pub async fn wait_for(
        &self,
        descriptor: &MediaDescriptor,
        timeout: Duration,
    ) -> Option<Arc<MediaSource>> {
        let key = descriptor.key();
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.registered.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(source) = self.find_key(&key) {
                return Some(source);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.find_key(&key);
            }
        }
    }

    /// Find a source, waiting up to `stream_wait_timeout` for it to appear
    ///
    /// `on_result` runs synchronously when the answer is known right away,
    /// otherwise on a spawned task.
    pub fn find_async<F>(self: &Arc<Self>, descriptor: &MediaDescriptor, on_result: F)
    where
        F: FnOnce(Option<Arc<MediaSource>>) + Send + 'static,
    {
        if let Some(source) = self.find(descriptor) {
            on_result(Some(source));
            return;
        }

        let wait = self.config.stream_wait_timeout;
        if wait.is_zero() {
            on_result(None);
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(stream = %descriptor, "No runtime to wait for stream on");
            on_result(None);
            return;
        };

        let registry = Arc::clone(self);
        let descriptor = descriptor.clone();
        runtime.spawn(async move {
            let source = registry.wait_for(&descriptor, wait).await;
            on_result(source);
        });
    }

    /// Ask the publisher of a stream to stop
    ///
    /// `Ok(false)` means the publisher refused.
    pub fn close_stream(
        &self,
        descriptor: &MediaDescriptor,
        force: bool,
    ) -> Result<bool, RegistryError> {
        let source = self
            .find(descriptor)
            .ok_or_else(|| RegistryError::StreamNotFound(descriptor.key()))?;
        Ok(source.close(force))
    }

    /// Number of published streams
    pub fn stream_count(&self) -> usize {
        self.sources.read().len()
    }
}

impl Default for MediaRegistry {
    fn default() -> Self {
        Self::new()
    }
}
