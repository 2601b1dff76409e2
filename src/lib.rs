//! # rtmp-session
//!
//! The per-connection half of an RTMP server: command dispatch, the
//! publish/play/pause/seek lifecycle, timestamp normalization, liveness
//! checks and the authorization hand-off, bridged to an in-process media
//! bus.
//!
//! The crate starts where the chunk parser ends. Whole [`RtmpPacket`]s go
//! into a [`Session`]; replies and media leave through a [`Transport`].
//!
//! ```no_run
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//!
//! use rtmp_session::events::{BusEvent, Topic};
//! use rtmp_session::server::{Inbound, Outbound, RtmpServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = RtmpServer::new(ServerConfig::default());
//!
//!     // Only streams carrying ?token=secret may be published
//!     server.events().add_listener(
//!         Topic::MediaPublish,
//!         Arc::new(|event: &BusEvent| {
//!             if let BusEvent::MediaPublish(request) = event {
//!                 match request.descriptor.param("token") {
//!                     Some("secret") => request.invoker.allow(),
//!                     _ => request.invoker.deny("bad token"),
//!                 };
//!             }
//!         }),
//!     );
//!
//!     let peer: SocketAddr = "10.0.0.7:50123".parse().unwrap();
//!     let mut handle = server.accept(peer).expect("connection limit");
//!
//!     // The socket reader pushes parsed messages into `handle.inbound`...
//!     handle.inbound.send(Inbound::Closed).await.unwrap();
//!
//!     // ...and the writer applies everything that comes back
//!     while let Some(item) = handle.outbound.recv().await {
//!         if let Outbound::Close(reason) = item {
//!             println!("closed: {}", reason);
//!         }
//!     }
//! }
//! ```

pub mod amf;
pub mod error;
pub mod events;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;

pub use error::{Error, Result};
pub use events::{AuthInvoker, BusEvent, EventBus, Topic};
pub use protocol::RtmpPacket;
pub use registry::{MediaDescriptor, MediaRegistry};
pub use server::{RtmpServer, ServerConfig};
pub use session::{CloseReason, Flow, Session, SessionConfig, Transport};
