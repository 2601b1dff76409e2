//! RTMP wire vocabulary
//!
//! Constants, whole-message packets and the protocol control messages the
//! session emits. Chunk framing lives outside this crate.

pub mod constants;
pub mod message;

pub use message::{status_object, ControlMessage, RtmpPacket, UserControlEvent};
