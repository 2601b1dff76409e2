//! AMF0 values and the command codec
//!
//! RTMP command (type 20/17) and data (type 18/15) messages are sequences
//! of AMF0 values. This module decodes them into [`AmfValue`] and exposes a
//! typed cursor for handlers that must read arguments at fixed positions.

pub mod amf0;
pub mod command;
pub mod value;

pub use amf0::{Amf0Decoder, Amf0Encoder};
pub use command::{encode_command, CommandReader};
pub use value::AmfValue;
