//! Test doubles and builders for session tests

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::config::SessionConfig;
use super::machine::{CloseReason, Flow, Session};
use super::transport::{Transport, WriteMode};
use crate::amf::{amf0, encode_command, AmfValue};
use crate::events::{AuthInvoker, BusEvent, EventBus, Topic};
use crate::protocol::constants::*;
use crate::protocol::{ControlMessage, RtmpPacket, UserControlEvent};
use crate::registry::{MediaDescriptor, MediaRegistry, RegistryConfig};

/// Everything a `MockTransport` was asked to do
#[derive(Debug, Default)]
pub struct TransportLog {
    pub packets: Vec<RtmpPacket>,
    pub receive_buffer: Option<usize>,
    pub send_timeout: Option<Duration>,
    pub write_mode: WriteMode,
    pub closed: Vec<CloseReason>,
}

impl TransportLog {
    /// Take the sent packets, described
    pub fn drain_described(&mut self) -> Vec<String> {
        self.packets.drain(..).map(|p| describe(&p)).collect()
    }
}

pub type SharedLog = Arc<Mutex<TransportLog>>;

pub struct MockTransport {
    log: SharedLog,
}

impl MockTransport {
    pub fn new() -> (Self, SharedLog) {
        let log = SharedLog::default();
        (
            Self {
                log: Arc::clone(&log),
            },
            log,
        )
    }
}

impl Transport for MockTransport {
    fn send(&mut self, packet: RtmpPacket) -> std::io::Result<()> {
        self.log.lock().packets.push(packet);
        Ok(())
    }

    fn set_receive_buffer_size(&mut self, size: usize) {
        self.log.lock().receive_buffer = Some(size);
    }

    fn set_send_timeout(&mut self, timeout: Duration) {
        self.log.lock().send_timeout = Some(timeout);
    }

    fn set_write_mode(&mut self, mode: WriteMode) {
        self.log.lock().write_mode = mode;
    }

    fn close(&mut self, reason: &CloseReason) {
        self.log.lock().closed.push(reason.clone());
    }
}

/// Shared media bus and event bus for a group of sessions
pub struct Harness {
    pub registry: Arc<MediaRegistry>,
    pub bus: Arc<EventBus>,
    pub config: Arc<SessionConfig>,
}

impl Harness {
    /// Plays answer immediately when the stream is missing
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        init_tracing();
        Self {
            registry: Arc::new(MediaRegistry::with_config(
                RegistryConfig::default().stream_wait_timeout(Duration::ZERO),
            )),
            bus: Arc::new(EventBus::new()),
            config: Arc::new(config),
        }
    }

    pub fn with_registry(registry: MediaRegistry) -> Self {
        init_tracing();
        Self {
            registry: Arc::new(registry),
            bus: Arc::new(EventBus::new()),
            config: Arc::new(SessionConfig::default()),
        }
    }

    pub fn session(&self, id: u64) -> (Session, SharedLog) {
        let (transport, log) = MockTransport::new();
        let session = Session::new(
            id,
            peer_addr(),
            Arc::clone(&self.config),
            Arc::clone(&self.registry),
            Arc::clone(&self.bus),
            Box::new(transport),
        );
        (session, log)
    }

    /// Session that is publishing `stream` on app `live`
    pub fn publisher(&self, id: u64, stream: &str) -> (Session, SharedLog) {
        let (mut session, log) = self.session(id);
        establish(&mut session);
        assert_eq!(session.on_message(publish_packet(stream)), Flow::Continue);
        assert_eq!(session.poll_tasks(), Flow::Continue);
        assert!(session.role().is_publisher(), "publish of {} failed", stream);
        (session, log)
    }

    /// Session that is playing `stream` on app `live`
    pub fn player(&self, id: u64, stream: &str) -> (Session, SharedLog) {
        let (mut session, log) = self.session(id);
        establish(&mut session);
        assert_eq!(session.on_message(play_packet(stream)), Flow::Continue);
        assert_eq!(session.poll_tasks(), Flow::Continue);
        assert!(session.role().is_subscriber(), "play of {} failed", stream);
        (session, log)
    }
}

/// Route session logs to the test output; `RUST_LOG` selects the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn peer_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 50000))
}

pub fn descriptor(stream: &str) -> MediaDescriptor {
    let mut descriptor = MediaDescriptor::parse(
        &format!("rtmp://127.0.0.1:1935/live/{}", stream),
        DEFAULT_VHOST,
    );
    descriptor.schema = RTMP_SCHEMA.to_string();
    descriptor
}

/// Command on the NetConnection stream
pub fn command(name: &str, transaction_id: f64, args: &[AmfValue]) -> RtmpPacket {
    command_on(STREAM_CONTROL, name, transaction_id, args)
}

pub fn command_on(stream_id: u32, name: &str, transaction_id: f64, args: &[AmfValue]) -> RtmpPacket {
    let mut values = vec![AmfValue::Number(transaction_id)];
    values.extend_from_slice(args);
    RtmpPacket::command(stream_id, encode_command(name, &values))
}

pub fn connect_packet(app: &str) -> RtmpPacket {
    let params = AmfValue::object()
        .with("app", app)
        .with("tcUrl", format!("rtmp://127.0.0.1:1935/{}", app))
        .with("flashVer", "FMLE/3.0")
        .with("objectEncoding", 0.0);
    command(CMD_CONNECT, 1.0, &[params])
}

pub fn create_stream_packet() -> RtmpPacket {
    command(CMD_CREATE_STREAM, 2.0, &[AmfValue::Null])
}

pub fn publish_packet(stream: &str) -> RtmpPacket {
    command_on(
        STREAM_MEDIA,
        CMD_PUBLISH,
        0.0,
        &[AmfValue::Null, stream.into(), "live".into()],
    )
}

pub fn play_packet(stream: &str) -> RtmpPacket {
    command_on(
        STREAM_MEDIA,
        CMD_PLAY,
        4.0,
        &[AmfValue::Null, stream.into(), AmfValue::Number(-2000.0)],
    )
}

pub fn pause_packet(paused: bool) -> RtmpPacket {
    command_on(
        STREAM_MEDIA,
        CMD_PAUSE,
        0.0,
        &[AmfValue::Null, paused.into(), AmfValue::Number(0.0)],
    )
}

pub fn seek_packet(stamp_ms: f64) -> RtmpPacket {
    command_on(
        STREAM_MEDIA,
        CMD_SEEK,
        0.0,
        &[AmfValue::Null, stamp_ms.into()],
    )
}

/// connect + createStream
pub fn establish(session: &mut Session) {
    assert_eq!(session.on_message(connect_packet("live")), Flow::Continue);
    assert_eq!(session.on_message(create_stream_packet()), Flow::Continue);
}

pub fn decode(packet: &RtmpPacket) -> Vec<AmfValue> {
    amf0::decode_all(packet.payload.clone()).unwrap()
}

/// Short label for asserting on reply sequences
pub fn describe(packet: &RtmpPacket) -> String {
    match packet.message_type {
        MSG_COMMAND_AMF0 | MSG_DATA_AMF0 => {
            let values = decode(packet);
            let name = values[0].as_str().unwrap_or("?").to_string();
            let prefix = if packet.message_type == MSG_DATA_AMF0 {
                "data:"
            } else {
                ""
            };
            let code = values
                .iter()
                .skip(1)
                .find_map(|v| v.get_string("code"))
                .filter(|_| name == CMD_ON_STATUS);
            match code {
                Some(code) => format!("{}{}({})", prefix, name, code),
                None => format!("{}{}", prefix, name),
            }
        }
        MSG_AUDIO => format!("audio@{}", packet.timestamp),
        MSG_VIDEO => format!("video@{}", packet.timestamp),
        _ => match ControlMessage::from_packet(packet) {
            Some(ControlMessage::SetChunkSize(_)) => "chunk-size".into(),
            Some(ControlMessage::WindowAckSize(_)) => "ack-window".into(),
            Some(ControlMessage::SetPeerBandwidth { .. }) => "peer-bandwidth".into(),
            Some(ControlMessage::UserControl(UserControlEvent::StreamBegin(_))) => {
                "stream-begin".into()
            }
            Some(ControlMessage::UserControl(UserControlEvent::StreamEof(_))) => {
                "stream-eof".into()
            }
            None => format!("type-{}", packet.message_type),
        },
    }
}

/// Keep every authorization request on `topic` pending for the test to answer
pub fn capture_invokers(bus: &EventBus, topic: Topic) -> Arc<Mutex<Vec<AuthInvoker>>> {
    let invokers = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&invokers);
    bus.add_listener(
        topic,
        Arc::new(move |event: &BusEvent| match event {
            BusEvent::MediaPublish(request) | BusEvent::MediaPlayed(request) => {
                sink.lock().push(request.invoker.clone());
            }
            _ => {}
        }),
    );
    invokers
}
