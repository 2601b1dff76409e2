//! Media bus: published sources and their distribution rings
//!
//! The registry maps stream descriptors to live sources. A publisher owns a
//! [`PublisherSink`]; subscribers hold a [`Subscription`] on the source's
//! `tokio::sync::broadcast` ring.
//!
//! # Architecture
//!
//! ```text
//!                       Arc<MediaRegistry>
//!                  ┌──────────────────────────┐
//!                  │ sources: HashMap<Key,    │
//!                  │   Arc<MediaSource> {     │
//!                  │     metadata,            │
//!                  │     config_packets,      │
//!                  │     ring: broadcast::Tx, │
//!                  │   }                      │
//!                  │ >                        │
//!                  └────────────┬─────────────┘
//!                               │
//!       ┌───────────────────────┼───────────────────────┐
//!       ▼                       ▼                       ▼
//!  PublisherSink          Subscription            Subscription
//!  (owns Arc, writes)     (Weak, reads)           (Weak, reads)
//! ```
//!
//! Packets travel as `Arc<RtmpPacket>` whose payload is `bytes::Bytes`, so
//! fan-out never copies media data.

pub mod config;
pub mod descriptor;
pub mod error;
pub mod ring;
pub mod sink;
pub mod source;
pub mod store;

pub use config::RegistryConfig;
pub use descriptor::{MediaDescriptor, StreamKey};
pub use error::RegistryError;
pub use ring::{RingEvent, Subscription};
pub use sink::PublisherSink;
pub use source::{MediaSource, SourceListener};
pub use store::MediaRegistry;
