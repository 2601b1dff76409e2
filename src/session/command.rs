//! Command dispatch
//!
//! Command messages are `name, transaction id, args...`. The name selects a
//! handler from a fixed table; names missing from the table are traced and
//! ignored without reading anything further.

use std::sync::Arc;

use tokio::time::Instant;

use super::hooks::PublisherHooks;
use super::machine::{default_tc_url, CloseReason, Flow, Session};
use super::state::{Role, SessionPhase};
use super::task::Intent;
use crate::amf::{AmfValue, CommandReader};
use crate::error::{AmfError, ProtocolError, Result};
use crate::protocol::constants::*;
use crate::protocol::{status_object, ControlMessage, RtmpPacket, UserControlEvent};
use crate::registry::{SourceListener, Subscription};

type CommandHandler = fn(&mut Session, &mut CommandReader) -> Result<Flow>;

/// Supported commands; built at compile time, never mutated
const COMMANDS: &[(&str, CommandHandler)] = &[
    (CMD_CONNECT, on_connect),
    (CMD_CREATE_STREAM, on_create_stream),
    (CMD_PUBLISH, on_publish),
    (CMD_DELETE_STREAM, on_delete_stream),
    (CMD_PLAY, on_play),
    (CMD_PLAY2, on_play2),
    (CMD_PAUSE, on_pause),
    (CMD_SEEK, on_seek),
];

fn lookup(name: &str) -> Option<CommandHandler> {
    COMMANDS
        .iter()
        .find(|(command, _)| *command == name)
        .map(|(_, handler)| *handler)
}

/// Route one command message to its handler
pub(super) fn dispatch(session: &mut Session, packet: RtmpPacket) -> Result<Flow> {
    let mut reader = if packet.message_type == MSG_COMMAND_AMF3 {
        CommandReader::with_amf3_prefix(packet.payload)
    } else {
        CommandReader::new(packet.payload)
    };

    let name = match reader.read_string() {
        Ok(name) => name,
        Err(AmfError::UnexpectedEof) => return Err(ProtocolError::MissingCommandName.into()),
        Err(err) => return Err(err.into()),
    };

    let Some(handler) = lookup(&name) else {
        tracing::trace!(session_id = session.id(), command = %name, "Unsupported command");
        return Ok(Flow::Continue);
    };

    session.request_id = reader.read_number()?;
    session.reply_stream_id = packet.stream_id;
    tracing::debug!(
        session_id = session.id(),
        command = %name,
        transaction_id = session.request_id,
        "Command"
    );

    handler(session, &mut reader)
}

fn on_connect(session: &mut Session, reader: &mut CommandReader) -> Result<Flow> {
    let params = reader.read_object()?;
    let app = params.get_string("app").unwrap_or_default().to_string();
    let tc_url = match params.get_string("tcUrl") {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => default_tc_url(&session.config.default_vhost, &app),
    };
    let object_encoding = params.get_number("objectEncoding").unwrap_or(0.0);

    let chunk_size = session.config.chunk_size;
    let window_ack_size = session.config.window_ack_size;
    let peer_bandwidth = session.config.peer_bandwidth;
    session.send_control(ControlMessage::SetChunkSize(chunk_size))?;
    session.send_control(ControlMessage::WindowAckSize(window_ack_size))?;
    session.send_control(ControlMessage::SetPeerBandwidth {
        size: peer_bandwidth,
        limit_type: BANDWIDTH_LIMIT_DYNAMIC,
    })?;

    let version = AmfValue::object()
        .with("fmsVer", FMS_VERSION)
        .with("capabilities", FMS_CAPABILITIES);
    let status = status_object("status", NC_CONNECT_SUCCESS, "Connection succeeded.")
        .with("objectEncoding", object_encoding);
    session.send_reply(CMD_RESULT, &[version, status])?;
    session.send_command(CMD_ON_BW_DONE, &[AmfValue::Number(0.0), AmfValue::Null])?;

    tracing::info!(
        session_id = session.id(),
        app = %app,
        tc_url = %tc_url,
        "Client connected"
    );

    session.descriptor.app = app.clone();
    session.context.app = app;
    session.context.tc_url = tc_url;
    session.context.object_encoding = object_encoding;
    session.phase = SessionPhase::Connected;
    Ok(Flow::Continue)
}

fn on_create_stream(session: &mut Session, _reader: &mut CommandReader) -> Result<Flow> {
    session.send_reply(
        CMD_RESULT,
        &[AmfValue::Null, AmfValue::Number(STREAM_MEDIA as f64)],
    )?;
    if session.phase == SessionPhase::Connected {
        session.phase = SessionPhase::StreamCreated;
    }
    Ok(Flow::Continue)
}

fn on_publish(session: &mut Session, reader: &mut CommandReader) -> Result<Flow> {
    reader.read_null()?;
    let stream = reader.read_string()?;
    session.resolve_descriptor(&stream);

    tracing::info!(
        session_id = session.id(),
        stream = %session.descriptor,
        params = %session.descriptor.params,
        "Publish requested"
    );
    session.authorize(Intent::Publish)
}

fn on_delete_stream(session: &mut Session, _reader: &mut CommandReader) -> Result<Flow> {
    session.send_status(status_object(
        "status",
        NS_UNPUBLISH_SUCCESS,
        "Stop publishing.",
    ))?;
    Ok(Flow::Close(CloseReason::Unpublished))
}

fn on_play(session: &mut Session, reader: &mut CommandReader) -> Result<Flow> {
    if session.role.is_publisher() {
        return Err(ProtocolError::PublisherCannotPlay.into());
    }
    reader.read_null()?;
    let stream = reader.read_string()?;
    session.resolve_descriptor(&stream);

    tracing::info!(
        session_id = session.id(),
        stream = %session.descriptor,
        params = %session.descriptor.params,
        "Play requested"
    );
    session.authorize(Intent::Play)
}

/// `play2(null, {streamName, ...})`; reuses the last play target without a name
fn on_play2(session: &mut Session, reader: &mut CommandReader) -> Result<Flow> {
    if session.role.is_publisher() {
        return Err(ProtocolError::PublisherCannotPlay.into());
    }

    let mut stream_name = None;
    while reader.has_remaining() {
        let value = reader.read_value()?;
        if let Some(name) = value.get_string("streamName") {
            stream_name = Some(name.to_string());
            break;
        }
    }

    match stream_name {
        Some(name) => session.resolve_descriptor(&name),
        None if session.descriptor.stream_id.is_empty() => {
            return session.reject_play(
                NS_PLAY_STREAM_NOT_FOUND,
                "No such stream.",
                "play2 without a stream name".to_string(),
            );
        }
        None => {}
    }

    tracing::info!(
        session_id = session.id(),
        stream = %session.descriptor,
        "Play2 requested"
    );
    session.authorize(Intent::Play)
}

fn on_pause(session: &mut Session, reader: &mut CommandReader) -> Result<Flow> {
    reader.read_null()?;
    let paused = reader.read_bool()?;
    tracing::debug!(session_id = session.id(), paused = paused, "Pause");

    let (code, description, event) = if paused {
        (
            NS_PAUSE_NOTIFY,
            "Paused stream.",
            UserControlEvent::StreamEof(STREAM_MEDIA),
        )
    } else {
        (
            NS_UNPAUSE_NOTIFY,
            "Unpaused stream.",
            UserControlEvent::StreamBegin(STREAM_MEDIA),
        )
    };
    session.send_status(status_object("status", code, description))?;
    session.send_user_control(event)?;

    let Some(subscription) = session.role.subscription_mut() else {
        return Err(ProtocolError::NotPlaying.into());
    };
    subscription.set_forwarding(!paused);
    session.phase = if paused {
        SessionPhase::Paused
    } else {
        SessionPhase::Playing
    };
    Ok(Flow::Continue)
}

fn on_seek(session: &mut Session, reader: &mut CommandReader) -> Result<Flow> {
    reader.read_null()?;
    let stamp_ms = reader.read_number()?.max(0.0) as u32;
    tracing::info!(session_id = session.id(), stamp_ms = stamp_ms, "Seek");

    if let Some(source) = session.role.subscription().and_then(Subscription::source) {
        source.seek_to(stamp_ms);
    }
    session.send_status(status_object("status", NS_SEEK_NOTIFY, "Seeking."))?;
    Ok(Flow::Continue)
}

fn publish_status(level: &str, code: &str, description: &str) -> AmfValue {
    status_object(level, code, description).with("clientid", "0")
}

impl Session {
    /// Finish a publish once its authorization verdict is known
    pub(super) fn on_publish_verdict(&mut self, err: &str, requested_at: Instant) -> Result<Flow> {
        tracing::debug!(
            session_id = self.id(),
            stream = %self.descriptor,
            elapsed_ms = requested_at.elapsed().as_millis() as u64,
            "Publish verdict"
        );

        if !err.is_empty() {
            self.send_status(publish_status("error", NS_PUBLISH_BAD_AUTH, err))?;
            return Ok(Flow::Close(CloseReason::PublishRejected(format!(
                "Unauthorized: {}",
                err
            ))));
        }

        let sink = if self.role.is_none() {
            self.registry.register_publisher(&self.descriptor).ok()
        } else {
            None
        };
        let Some(sink) = sink else {
            self.send_status(publish_status(
                "error",
                NS_PUBLISH_BAD_NAME,
                "Already publishing.",
            ))?;
            return Ok(Flow::Close(CloseReason::PublishRejected(format!(
                "Already publishing: {}",
                self.descriptor
            ))));
        };

        let hooks: Arc<dyn SourceListener> = Arc::new(PublisherHooks::new(self.task_handle()));
        sink.set_listener(Arc::downgrade(&hooks));
        self.hooks = Some(hooks);
        self.role = Role::Publisher(sink);
        self.ever_published = true;
        self.phase = SessionPhase::Publishing;

        self.send_status(publish_status(
            "status",
            NS_PUBLISH_START,
            "Started publishing stream.",
        ))?;
        self.transport
            .set_receive_buffer_size(self.config.publisher_recv_buffer);

        tracing::info!(
            session_id = self.id(),
            stream = %self.descriptor,
            "Publishing started"
        );
        Ok(Flow::Continue)
    }
}
