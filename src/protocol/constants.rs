//! RTMP protocol constants
//!
//! Reference: Adobe RTMP Specification (December 2012)

/// Schema recorded in every media descriptor resolved by this crate
pub const RTMP_SCHEMA: &str = "rtmp";

/// Vhost used when the URL names none (or names a bare IP / localhost)
pub const DEFAULT_VHOST: &str = "__defaultVhost__";

// ============================================================================
// Chunk Stream IDs (CSID)
// ============================================================================

/// Protocol control messages and user control events
pub const CSID_PROTOCOL_CONTROL: u32 = 2;

/// Server replies and notifications
pub const CSID_SERVER_REQUEST: u32 = 3;

// ============================================================================
// Message stream IDs
// ============================================================================

/// NetConnection stream
pub const STREAM_CONTROL: u32 = 0;

/// The single logical media stream handed out by createStream
pub const STREAM_MEDIA: u32 = 1;

// ============================================================================
// Message Type IDs
// ============================================================================

pub const MSG_SET_CHUNK_SIZE: u8 = 1;
pub const MSG_ABORT: u8 = 2;
pub const MSG_ACKNOWLEDGEMENT: u8 = 3;
pub const MSG_USER_CONTROL: u8 = 4;
pub const MSG_WINDOW_ACK_SIZE: u8 = 5;
pub const MSG_SET_PEER_BANDWIDTH: u8 = 6;
pub const MSG_AUDIO: u8 = 8;
pub const MSG_VIDEO: u8 = 9;
/// Data message with AMF3 format byte
pub const MSG_DATA_AMF3: u8 = 15;
/// Command message with AMF3 format byte
pub const MSG_COMMAND_AMF3: u8 = 17;
pub const MSG_DATA_AMF0: u8 = 18;
pub const MSG_COMMAND_AMF0: u8 = 20;

// ============================================================================
// User Control Event Types
// ============================================================================

pub const UC_STREAM_BEGIN: u16 = 0;
pub const UC_STREAM_EOF: u16 = 1;

/// Peer bandwidth limit type: dynamic
pub const BANDWIDTH_LIMIT_DYNAMIC: u8 = 2;

// ============================================================================
// Command names
// ============================================================================

pub const CMD_CONNECT: &str = "connect";
pub const CMD_CREATE_STREAM: &str = "createStream";
pub const CMD_PUBLISH: &str = "publish";
pub const CMD_DELETE_STREAM: &str = "deleteStream";
pub const CMD_PLAY: &str = "play";
pub const CMD_PLAY2: &str = "play2";
pub const CMD_SEEK: &str = "seek";
pub const CMD_PAUSE: &str = "pause";

pub const CMD_RESULT: &str = "_result";
pub const CMD_ON_STATUS: &str = "onStatus";
pub const CMD_ON_BW_DONE: &str = "onBWDone";

pub const CMD_SET_DATA_FRAME: &str = "@setDataFrame";
pub const CMD_ON_METADATA: &str = "onMetaData";
pub const CMD_SAMPLE_ACCESS: &str = "|RtmpSampleAccess";

// ============================================================================
// Status codes
// ============================================================================

pub const NC_CONNECT_SUCCESS: &str = "NetConnection.Connect.Success";

pub const NS_PUBLISH_START: &str = "NetStream.Publish.Start";
pub const NS_PUBLISH_BAD_NAME: &str = "NetStream.Publish.BadName";
pub const NS_PUBLISH_BAD_AUTH: &str = "NetStream.Publish.BadAuth";
pub const NS_UNPUBLISH_SUCCESS: &str = "NetStream.Unpublish.Success";
pub const NS_PLAY_RESET: &str = "NetStream.Play.Reset";
pub const NS_PLAY_START: &str = "NetStream.Play.Start";
pub const NS_PLAY_STREAM_NOT_FOUND: &str = "NetStream.Play.StreamNotFound";
pub const NS_PLAY_BAD_AUTH: &str = "NetStream.Play.BadAuth";
pub const NS_PLAY_PUBLISH_NOTIFY: &str = "NetStream.Play.PublishNotify";
pub const NS_DATA_START: &str = "NetStream.Data.Start";
pub const NS_PAUSE_NOTIFY: &str = "NetStream.Pause.Notify";
pub const NS_UNPAUSE_NOTIFY: &str = "NetStream.Unpause.Notify";
pub const NS_SEEK_NOTIFY: &str = "NetStream.Seek.Notify";

// ============================================================================
// Server identity advertised in the connect reply
// ============================================================================

pub const FMS_VERSION: &str = "FMS/3,0,1,123";
pub const FMS_CAPABILITIES: f64 = 31.0;
