//! Per-connection RTMP session engine
//!
//! A [`Session`] sits between an external chunk parser and the media bus.
//! It is a synchronous state machine: every input (`on_message`,
//! `on_manager`, ring events, queued tasks) returns a [`Flow`] telling the
//! driver whether the connection stays open.
//!
//! ```text
//!  chunk parser ──RtmpPacket──▶ Session::on_message ──▶ command table
//!                                     │                     │
//!                                     │              authorize (EventBus)
//!                                     │                     │ verdict
//!                                     ▼                     ▼
//!                               PublisherSink ◀── task queue (weak handle)
//!                                                           │
//!  Transport ◀── normalized packets ◀── Subscription ◀──────┘
//! ```

mod command;
pub mod config;
pub mod context;
mod hooks;
pub mod liveness;
mod machine;
mod play;
pub mod state;
mod task;
pub mod timestamp;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use config::SessionConfig;
pub use context::SessionContext;
pub use liveness::LivenessMonitor;
pub use machine::{CloseReason, Flow, Session};
pub use state::{Role, SessionPhase};
pub use timestamp::{IngestStamper, TimestampNormalizer};
pub use transport::{Transport, WriteMode};
