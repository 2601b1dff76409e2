//! Per-connection protocol engine
//!
//! A [`Session`] is driven by one task. It receives whole messages from the
//! chunk layer, answers commands through its [`Transport`], and bridges the
//! connection to the media bus as either a publisher or a subscriber.
//!
//! Work that completes elsewhere (authorization verdicts, source lookups,
//! kicks from the bus) is posted to the session's own queue through a weak
//! handle and executed by [`Session::drive`] or [`Session::poll_tasks`].
//! Every fatal path ends in [`Session::shutdown`], which runs at most once.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;

use super::command;
use super::config::SessionConfig;
use super::context::SessionContext;
use super::liveness::LivenessMonitor;
use super::state::{Role, SessionPhase};
use super::task::{Intent, SessionTask, TaskHandle};
use super::timestamp::{IngestStamper, TimestampNormalizer};
use super::transport::Transport;
use crate::amf::{encode_command, AmfValue, CommandReader};
use crate::error::{Error, ProtocolError, Result};
use crate::events::{AuthInvoker, AuthRequest, BusEvent, EventBus, FlowReport};
use crate::protocol::constants::*;
use crate::protocol::{ControlMessage, RtmpPacket, UserControlEvent};
use crate::registry::{
    MediaDescriptor, MediaRegistry, RingEvent, SourceListener, Subscription,
};
use crate::stats::SessionStats;

/// Outcome of handling one input
#[must_use]
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Keep the connection open
    Continue,
    /// The session has been shut down for this reason
    Close(CloseReason),
}

impl Flow {
    pub fn is_close(&self) -> bool {
        matches!(self, Flow::Close(_))
    }
}

/// Why a session ended
#[derive(Debug, Clone, PartialEq)]
pub enum CloseReason {
    /// Peer sent deleteStream
    Unpublished,
    /// Publish denied or the name is taken
    PublishRejected(String),
    /// Play denied or the stream does not exist
    PlayRejected(String),
    /// Neither published nor played in time
    HandshakeTimeout,
    /// Publisher went silent
    ReceiveTimeout,
    /// The played stream went away
    RingDetached,
    /// The media bus asked the publisher to stop
    Kicked(String),
    /// Transport reported end of stream
    PeerClosed,
    /// Session dropped without an explicit close
    Dropped,
    /// Protocol violation or I/O failure
    Failed(String),
}

impl CloseReason {
    pub fn is_timeout(&self) -> bool {
        matches!(self, CloseReason::HandshakeTimeout | CloseReason::ReceiveTimeout)
    }

    fn is_error(&self) -> bool {
        matches!(
            self,
            CloseReason::HandshakeTimeout | CloseReason::ReceiveTimeout | CloseReason::Failed(_)
        )
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Unpublished => write!(f, "Stop publishing."),
            CloseReason::PublishRejected(msg)
            | CloseReason::PlayRejected(msg)
            | CloseReason::Kicked(msg)
            | CloseReason::Failed(msg) => write!(f, "{}", msg),
            CloseReason::HandshakeTimeout => write!(f, "illegal connection"),
            CloseReason::ReceiveTimeout => write!(f, "recv data from rtmp pusher timeout"),
            CloseReason::RingDetached => write!(f, "rtmp ring buffer detached"),
            CloseReason::PeerClosed => write!(f, "peer closed connection"),
            CloseReason::Dropped => write!(f, "session dropped"),
        }
    }
}

impl From<Error> for CloseReason {
    fn from(err: Error) -> Self {
        CloseReason::Failed(err.to_string())
    }
}

enum Wakeup {
    Task(SessionTask),
    Ring(RingEvent),
}

/// One RTMP connection's protocol state
pub struct Session {
    pub(super) context: SessionContext,
    pub(super) config: Arc<SessionConfig>,
    pub(super) registry: Arc<MediaRegistry>,
    pub(super) bus: Arc<EventBus>,
    pub(super) transport: Box<dyn Transport>,
    pub(super) phase: SessionPhase,
    pub(super) role: Role,
    pub(super) descriptor: MediaDescriptor,
    /// Transaction id of the command being answered
    pub(super) request_id: f64,
    /// Message stream replies go out on
    pub(super) reply_stream_id: u32,
    pub(super) normalizer: TimestampNormalizer,
    stamper: IngestStamper,
    liveness: LivenessMonitor,
    pub(super) stats: SessionStats,
    pub(super) ever_published: bool,
    /// Keeps the publisher hooks alive; the source only holds them weakly
    pub(super) hooks: Option<Arc<dyn SourceListener>>,
    tasks_tx: mpsc::UnboundedSender<SessionTask>,
    tasks_rx: mpsc::UnboundedReceiver<SessionTask>,
    closed: Option<CloseReason>,
}

impl Session {
    pub fn new(
        session_id: u64,
        peer_addr: SocketAddr,
        config: Arc<SessionConfig>,
        registry: Arc<MediaRegistry>,
        bus: Arc<EventBus>,
        mut transport: Box<dyn Transport>,
    ) -> Self {
        transport.set_send_timeout(config.keep_alive);
        transport.set_receive_buffer_size(config.initial_recv_buffer);

        let (tasks_tx, tasks_rx) = mpsc::unbounded_channel();
        tracing::debug!(session_id = session_id, peer = %peer_addr, "Session created");

        Self {
            context: SessionContext::new(session_id, peer_addr),
            config,
            registry,
            bus,
            transport,
            phase: SessionPhase::Idle,
            role: Role::None,
            descriptor: MediaDescriptor::default(),
            request_id: 0.0,
            reply_stream_id: STREAM_CONTROL,
            normalizer: TimestampNormalizer::new(),
            stamper: IngestStamper::new(),
            liveness: LivenessMonitor::new(),
            stats: SessionStats::new(),
            ever_published: false,
            hooks: None,
            tasks_tx,
            tasks_rx,
            closed: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.context.session_id
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    /// Stream named by the last publish/play
    pub fn descriptor(&self) -> &MediaDescriptor {
        &self.descriptor
    }

    /// Transaction id of the last command
    pub fn request_id(&self) -> f64 {
        self.request_id
    }

    /// Counters snapshot
    pub fn stats(&self) -> SessionStats {
        let mut stats = self.stats.clone();
        stats.duration = self.liveness.age();
        stats
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_some()
    }

    pub fn close_reason(&self) -> Option<&CloseReason> {
        self.closed.as_ref()
    }

    pub(crate) fn task_handle(&self) -> TaskHandle {
        TaskHandle::new(self.tasks_tx.downgrade())
    }

    /// Account for bytes read from the transport
    pub fn on_recv(&mut self, bytes: usize) {
        self.liveness.touch();
        self.stats.record_received(bytes);
    }

    /// Handle one complete inbound message
    pub fn on_message(&mut self, packet: RtmpPacket) -> Flow {
        if let Some(reason) = &self.closed {
            return Flow::Close(reason.clone());
        }
        let outcome = self.process_message(packet);
        self.settle(outcome)
    }

    /// Periodic liveness check
    pub fn on_manager(&mut self) -> Flow {
        if let Some(reason) = &self.closed {
            return Flow::Close(reason.clone());
        }
        let verdict = self.liveness.check(
            !self.role.is_none(),
            self.role.is_publisher(),
            self.config.handshake_timeout,
            self.config.keep_alive,
        );
        match verdict {
            Some(reason) => self.settle(Ok(Flow::Close(reason))),
            None => Flow::Continue,
        }
    }

    /// Handle one event from the played stream
    pub fn on_ring_event(&mut self, event: RingEvent) -> Flow {
        if let Some(reason) = &self.closed {
            return Flow::Close(reason.clone());
        }
        if !self.role.is_subscriber() {
            return Flow::Continue;
        }
        let outcome = match event {
            RingEvent::Packet(packet) => self.forward(&packet),
            RingEvent::Lagged(skipped) => {
                self.stats.record_lag(skipped);
                tracing::debug!(
                    session_id = self.id(),
                    skipped = skipped,
                    "Subscriber lagging behind ring"
                );
                Ok(Flow::Continue)
            }
            RingEvent::Detached => Ok(Flow::Close(CloseReason::RingDetached)),
        };
        self.settle(outcome)
    }

    /// Run every task queued so far
    pub fn poll_tasks(&mut self) -> Flow {
        loop {
            if let Some(reason) = &self.closed {
                return Flow::Close(reason.clone());
            }
            let Ok(task) = self.tasks_rx.try_recv() else {
                return Flow::Continue;
            };
            if let Flow::Close(reason) = self.run_task(task) {
                return Flow::Close(reason);
            }
        }
    }

    /// Handle every ring event already buffered for this subscriber
    pub fn poll_ring(&mut self) -> Flow {
        loop {
            if let Some(reason) = &self.closed {
                return Flow::Close(reason.clone());
            }
            let Some(event) = self.role.subscription_mut().and_then(Subscription::try_recv) else {
                return Flow::Continue;
            };
            if let Flow::Close(reason) = self.on_ring_event(event) {
                return Flow::Close(reason);
            }
        }
    }

    /// Wait for the next queued task or ring event and handle it
    ///
    /// Cancel safe: nothing is consumed until the wait completes.
    pub async fn drive(&mut self) -> Flow {
        if let Some(reason) = &self.closed {
            return Flow::Close(reason.clone());
        }
        let wakeup = {
            let tasks = &mut self.tasks_rx;
            let ring = self.role.subscription_mut();
            tokio::select! {
                Some(task) = tasks.recv() => Wakeup::Task(task),
                event = next_ring_event(ring) => Wakeup::Ring(event),
            }
        };
        match wakeup {
            Wakeup::Task(task) => self.run_task(task),
            Wakeup::Ring(event) => self.on_ring_event(event),
        }
    }

    /// Close the session; only the first call has any effect
    ///
    /// Emits the flow report, releases the media bus handle and closes the
    /// transport.
    pub fn shutdown(&mut self, reason: CloseReason) {
        if self.closed.is_some() {
            return;
        }

        if reason.is_error() {
            tracing::warn!(
                session_id = self.id(),
                peer = %self.context.peer_addr,
                role = self.role.as_str(),
                reason = %reason,
                "Session closed"
            );
        } else {
            tracing::info!(
                session_id = self.id(),
                peer = %self.context.peer_addr,
                role = self.role.as_str(),
                reason = %reason,
                "Session closed"
            );
        }

        self.report_flow();
        self.role = Role::None;
        self.hooks = None;
        self.phase = SessionPhase::Closed;
        self.transport.close(&reason);
        self.closed = Some(reason);
    }

    fn settle(&mut self, outcome: Result<Flow>) -> Flow {
        let flow = outcome.unwrap_or_else(|err| Flow::Close(CloseReason::from(err)));
        if let Flow::Close(reason) = &flow {
            self.shutdown(reason.clone());
        }
        flow
    }

    fn run_task(&mut self, task: SessionTask) -> Flow {
        if let Some(reason) = &self.closed {
            return Flow::Close(reason.clone());
        }
        let outcome = match task {
            SessionTask::Verdict {
                intent,
                err,
                requested_at,
            } => self.on_verdict(intent, &err, requested_at),
            SessionTask::PlaySource {
                source,
                requested_at,
            } => self.on_play_source(source, requested_at),
            SessionTask::NoneReader => {
                self.on_none_reader();
                Ok(Flow::Continue)
            }
            SessionTask::Shutdown(reason) => Ok(Flow::Close(reason)),
        };
        self.settle(outcome)
    }

    fn process_message(&mut self, packet: RtmpPacket) -> Result<Flow> {
        match packet.message_type {
            MSG_COMMAND_AMF0 | MSG_COMMAND_AMF3 => command::dispatch(self, packet),
            MSG_DATA_AMF0 | MSG_DATA_AMF3 => self.on_data(packet),
            MSG_AUDIO | MSG_VIDEO => self.on_media(packet),
            MSG_SET_CHUNK_SIZE..=MSG_SET_PEER_BANDWIDTH => {
                tracing::trace!(
                    session_id = self.id(),
                    control = ?ControlMessage::from_packet(&packet),
                    "Protocol control message"
                );
                Ok(Flow::Continue)
            }
            other => {
                tracing::warn!(
                    session_id = self.id(),
                    message_type = other,
                    len = packet.payload.len(),
                    "Unhandled message"
                );
                Ok(Flow::Continue)
            }
        }
    }

    fn on_data(&mut self, packet: RtmpPacket) -> Result<Flow> {
        let mut reader = if packet.message_type == MSG_DATA_AMF3 {
            CommandReader::with_amf3_prefix(packet.payload)
        } else {
            CommandReader::new(packet.payload)
        };
        let name = reader.read_string()?;
        tracing::trace!(session_id = self.id(), name = %name, "Data message");

        if name == CMD_SET_DATA_FRAME {
            self.set_metadata(&mut reader)?;
        }
        Ok(Flow::Continue)
    }

    fn set_metadata(&mut self, reader: &mut CommandReader) -> Result<()> {
        let Some(sink) = self.role.publisher() else {
            return Err(ProtocolError::NotPublisher.into());
        };
        let name = reader.read_string()?;
        if name != CMD_ON_METADATA {
            return Err(ProtocolError::MetadataOnly(name).into());
        }
        let metadata = reader.read_object()?;
        sink.set_metadata(metadata);
        tracing::debug!(session_id = self.id(), stream = %self.descriptor, "Metadata updated");
        Ok(())
    }

    fn on_media(&mut self, mut packet: RtmpPacket) -> Result<Flow> {
        let Role::Publisher(sink) = &self.role else {
            return Err(ProtocolError::NotPublisher.into());
        };
        if self.config.modify_stamp {
            packet.timestamp = self.stamper.stamp(&packet);
        }
        self.stats.media_received += 1;
        sink.write(packet);
        Ok(Flow::Continue)
    }

    fn forward(&mut self, packet: &RtmpPacket) -> Result<Flow> {
        let forwarding = self
            .role
            .subscription()
            .is_some_and(Subscription::is_forwarding);
        if !forwarding {
            self.stats.dropped_while_paused += 1;
            return Ok(Flow::Continue);
        }
        self.send_media(packet)?;
        self.stats.packets_forwarded += 1;
        Ok(Flow::Continue)
    }

    fn on_none_reader(&mut self) {
        let Some(sink) = self.role.publisher() else {
            return;
        };
        if sink.reader_count() != 0 {
            return;
        }
        tracing::debug!(session_id = self.id(), stream = %self.descriptor, "No readers left");
        self.bus
            .emit(&BusEvent::StreamNoneReader(self.descriptor.clone()));
    }

    fn report_flow(&self) {
        let total_bytes = self.stats.bytes_received;
        if total_bytes <= self.config.flow_threshold_bytes {
            return;
        }
        let report = FlowReport {
            descriptor: self.descriptor.clone(),
            total_bytes,
            duration: self.liveness.age(),
            is_player: !self.ever_published,
            session: self.context.clone(),
        };
        self.bus.emit(&BusEvent::FlowReport(report));
    }

    /// Resolve the descriptor from the connect URL plus a stream path
    pub(super) fn resolve_descriptor(&mut self, stream_path: &str) {
        let tc_url = if self.context.tc_url.is_empty() {
            default_tc_url(&self.config.default_vhost, &self.context.app)
        } else {
            self.context.tc_url.clone()
        };
        let mut descriptor =
            MediaDescriptor::parse(&format!("{}/{}", tc_url, stream_path), &self.config.default_vhost);
        descriptor.schema = RTMP_SCHEMA.to_string();
        self.descriptor = descriptor;
    }

    /// Ask the bus for permission; answered now when nobody listens
    pub(super) fn authorize(&mut self, intent: Intent) -> Result<Flow> {
        let requested_at = Instant::now();
        let tasks = self.task_handle();
        let invoker = AuthInvoker::new(move |err: String| {
            tasks.post(SessionTask::Verdict {
                intent,
                err,
                requested_at,
            });
        });
        let request = AuthRequest {
            descriptor: self.descriptor.clone(),
            session: self.context.clone(),
            invoker,
        };
        let event = match intent {
            Intent::Publish => BusEvent::MediaPublish(request),
            Intent::Play => BusEvent::MediaPlayed(request),
        };

        if self.bus.emit(&event) {
            tracing::debug!(
                session_id = self.id(),
                stream = %self.descriptor,
                intent = intent.as_str(),
                "Awaiting authorization"
            );
            return Ok(Flow::Continue);
        }
        self.on_verdict(intent, "", requested_at)
    }

    fn on_verdict(&mut self, intent: Intent, err: &str, requested_at: Instant) -> Result<Flow> {
        match intent {
            Intent::Publish => self.on_publish_verdict(err, requested_at),
            Intent::Play => self.on_play_verdict(err, requested_at),
        }
    }

    pub(super) fn send(&mut self, packet: RtmpPacket) -> Result<()> {
        self.stats.record_sent(packet.payload.len());
        self.transport.send(packet)?;
        Ok(())
    }

    pub(super) fn send_control(&mut self, message: ControlMessage) -> Result<()> {
        self.send(message.into_packet())
    }

    pub(super) fn send_user_control(&mut self, event: UserControlEvent) -> Result<()> {
        self.send_control(ControlMessage::UserControl(event))
    }

    /// `name, request_id, args...` on the reply stream
    pub(super) fn send_reply(&mut self, name: &str, args: &[AmfValue]) -> Result<()> {
        let mut values = Vec::with_capacity(args.len() + 1);
        values.push(AmfValue::Number(self.request_id));
        values.extend_from_slice(args);
        self.send_command(name, &values)
    }

    /// `onStatus(request_id, null, status)`
    pub(super) fn send_status(&mut self, status: AmfValue) -> Result<()> {
        self.send_reply(CMD_ON_STATUS, &[AmfValue::Null, status])
    }

    pub(super) fn send_command(&mut self, name: &str, args: &[AmfValue]) -> Result<()> {
        let payload = encode_command(name, args);
        self.send(RtmpPacket::command(self.reply_stream_id, payload))
    }

    pub(super) fn send_data(&mut self, name: &str, args: &[AmfValue]) -> Result<()> {
        let payload = encode_command(name, args);
        self.send(RtmpPacket::data(self.reply_stream_id, payload))
    }

    /// Send a shared packet with a normalized timestamp
    pub(super) fn send_media(&mut self, packet: &RtmpPacket) -> Result<()> {
        let stamp = self.normalizer.normalize(packet);
        self.send(packet.with_timestamp(stamp))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown(CloseReason::Dropped);
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.context.session_id)
            .field("phase", &self.phase)
            .field("role", &self.role.as_str())
            .field("stream", &self.descriptor.to_string())
            .finish()
    }
}

pub(super) fn default_tc_url(vhost: &str, app: &str) -> String {
    format!("{}://{}/{}", RTMP_SCHEMA, vhost, app)
}

async fn next_ring_event(ring: Option<&mut Subscription>) -> RingEvent {
    match ring {
        Some(sub) => sub.recv().await,
        None => std::future::pending().await,
    }
}
