//! RTMP messages as seen by the session
//!
//! The chunk layer reassembles complete messages before they reach the
//! session; everything here works on whole [`RtmpPacket`]s.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::constants::*;
use crate::amf::AmfValue;

/// One complete RTMP message
///
/// Packets read from the distribution ring are shared between subscribers
/// behind an `Arc` and never mutated; use [`RtmpPacket::with_timestamp`] to
/// derive the copy that goes on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct RtmpPacket {
    /// Message type id (8 = audio, 9 = video, 20 = command, ...)
    pub message_type: u8,
    /// Message stream id
    pub stream_id: u32,
    /// Chunk stream id the message travels on
    pub chunk_id: u32,
    /// Timestamp in milliseconds
    pub timestamp: u32,
    /// Message body
    pub payload: Bytes,
}

impl RtmpPacket {
    pub fn new(message_type: u8, stream_id: u32, chunk_id: u32, timestamp: u32, payload: Bytes) -> Self {
        Self {
            message_type,
            stream_id,
            chunk_id,
            timestamp,
            payload,
        }
    }

    /// AMF0 command message on the server request chunk stream
    pub fn command(stream_id: u32, payload: Bytes) -> Self {
        Self::new(MSG_COMMAND_AMF0, stream_id, CSID_SERVER_REQUEST, 0, payload)
    }

    /// AMF0 data message on the server request chunk stream
    pub fn data(stream_id: u32, payload: Bytes) -> Self {
        Self::new(MSG_DATA_AMF0, stream_id, CSID_SERVER_REQUEST, 0, payload)
    }

    pub fn audio(timestamp: u32, payload: Bytes) -> Self {
        Self::new(MSG_AUDIO, STREAM_MEDIA, 4, timestamp, payload)
    }

    pub fn video(timestamp: u32, payload: Bytes) -> Self {
        Self::new(MSG_VIDEO, STREAM_MEDIA, 6, timestamp, payload)
    }

    pub fn is_audio(&self) -> bool {
        self.message_type == MSG_AUDIO
    }

    pub fn is_video(&self) -> bool {
        self.message_type == MSG_VIDEO
    }

    /// Timestamp lineage: audio-class and video-class messages differ in parity
    pub fn channel(&self) -> usize {
        (self.message_type % 2) as usize
    }

    /// Codec initialisation packet (AVC/HEVC or AAC sequence header)
    pub fn is_config(&self) -> bool {
        let data = &self.payload;
        if data.len() < 2 {
            return false;
        }
        if self.is_video() {
            let codec = data[0] & 0x0F;
            (codec == 7 || codec == 12) && data[1] == 0
        } else if self.is_audio() {
            (data[0] >> 4) == 10 && data[1] == 0
        } else {
            false
        }
    }

    /// Copy with a different timestamp; the payload is shared, not copied
    pub fn with_timestamp(&self, timestamp: u32) -> Self {
        Self {
            timestamp,
            payload: self.payload.clone(),
            ..*self
        }
    }
}

/// User control event (message type 4)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserControlEvent {
    StreamBegin(u32),
    StreamEof(u32),
}

/// Protocol control messages the session emits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    SetChunkSize(u32),
    WindowAckSize(u32),
    SetPeerBandwidth { size: u32, limit_type: u8 },
    UserControl(UserControlEvent),
}

impl ControlMessage {
    /// Encode into a packet on the protocol control chunk stream
    pub fn into_packet(self) -> RtmpPacket {
        let mut buf = BytesMut::with_capacity(6);
        let message_type = match self {
            ControlMessage::SetChunkSize(size) => {
                buf.put_u32(size & 0x7FFF_FFFF);
                MSG_SET_CHUNK_SIZE
            }
            ControlMessage::WindowAckSize(size) => {
                buf.put_u32(size);
                MSG_WINDOW_ACK_SIZE
            }
            ControlMessage::SetPeerBandwidth { size, limit_type } => {
                buf.put_u32(size);
                buf.put_u8(limit_type);
                MSG_SET_PEER_BANDWIDTH
            }
            ControlMessage::UserControl(event) => {
                let (kind, stream_id) = match event {
                    UserControlEvent::StreamBegin(id) => (UC_STREAM_BEGIN, id),
                    UserControlEvent::StreamEof(id) => (UC_STREAM_EOF, id),
                };
                buf.put_u16(kind);
                buf.put_u32(stream_id);
                MSG_USER_CONTROL
            }
        };

        RtmpPacket::new(
            message_type,
            STREAM_CONTROL,
            CSID_PROTOCOL_CONTROL,
            0,
            buf.freeze(),
        )
    }

    /// Decode a protocol control packet; `None` for anything else
    pub fn from_packet(packet: &RtmpPacket) -> Option<Self> {
        let mut data = packet.payload.clone();
        match packet.message_type {
            MSG_SET_CHUNK_SIZE if data.remaining() >= 4 => {
                Some(ControlMessage::SetChunkSize(data.get_u32()))
            }
            MSG_WINDOW_ACK_SIZE if data.remaining() >= 4 => {
                Some(ControlMessage::WindowAckSize(data.get_u32()))
            }
            MSG_SET_PEER_BANDWIDTH if data.remaining() >= 5 => {
                Some(ControlMessage::SetPeerBandwidth {
                    size: data.get_u32(),
                    limit_type: data.get_u8(),
                })
            }
            MSG_USER_CONTROL if data.remaining() >= 6 => {
                let kind = data.get_u16();
                let stream_id = data.get_u32();
                match kind {
                    UC_STREAM_BEGIN => Some(ControlMessage::UserControl(
                        UserControlEvent::StreamBegin(stream_id),
                    )),
                    UC_STREAM_EOF => Some(ControlMessage::UserControl(
                        UserControlEvent::StreamEof(stream_id),
                    )),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

/// Status info object carried by `onStatus` replies
pub fn status_object(level: &str, code: &str, description: &str) -> AmfValue {
    AmfValue::object()
        .with("level", level)
        .with("code", code)
        .with("description", description)
}
