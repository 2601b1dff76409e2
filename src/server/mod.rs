//! Process glue around sessions
//!
//! [`RtmpServer`] owns the shared media bus and event bus and spawns a
//! [`Connection`] per peer. Bytes on the wire stay with the caller: it feeds
//! [`Inbound`] items in and applies the [`Outbound`] items that come back.

pub mod config;
pub mod connection;
pub mod listener;
pub mod transport;

pub use config::ServerConfig;
pub use connection::{Connection, Inbound};
pub use listener::{RtmpServer, SessionHandle};
pub use transport::{ChannelTransport, Outbound};
