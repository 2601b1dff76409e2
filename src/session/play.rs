//! Play path: verdict, source lookup and the play response

use std::sync::Arc;

use tokio::time::Instant;

use super::machine::{CloseReason, Flow, Session};
use super::state::{Role, SessionPhase};
use super::task::SessionTask;
use super::transport::WriteMode;
use crate::amf::AmfValue;
use crate::error::{ProtocolError, Result};
use crate::protocol::constants::*;
use crate::protocol::{status_object, UserControlEvent};
use crate::registry::MediaSource;

impl Session {
    /// Continue a play once its authorization verdict is known
    pub(super) fn on_play_verdict(&mut self, err: &str, requested_at: Instant) -> Result<Flow> {
        // A publish may have completed while the verdict was pending
        if self.role.is_publisher() {
            return Err(ProtocolError::PublisherCannotPlay.into());
        }
        if !err.is_empty() {
            return self.reject_play(NS_PLAY_BAD_AUTH, err, format!("Unauthorized: {}", err));
        }

        if let Some(source) = self.registry.find(&self.descriptor) {
            return self.on_play_source(Some(source), requested_at);
        }
        if self.registry.config().stream_wait_timeout.is_zero() {
            return self.on_play_source(None, requested_at);
        }

        tracing::debug!(
            session_id = self.id(),
            stream = %self.descriptor,
            "Waiting for stream to be published"
        );
        let tasks = self.task_handle();
        self.registry.find_async(&self.descriptor, move |source| {
            tasks.post(SessionTask::PlaySource {
                source,
                requested_at,
            });
        });
        Ok(Flow::Continue)
    }

    pub(super) fn on_play_source(
        &mut self,
        source: Option<Arc<MediaSource>>,
        requested_at: Instant,
    ) -> Result<Flow> {
        if self.role.is_publisher() {
            return Err(ProtocolError::PublisherCannotPlay.into());
        }
        tracing::debug!(
            session_id = self.id(),
            stream = %self.descriptor,
            found = source.is_some(),
            elapsed_ms = requested_at.elapsed().as_millis() as u64,
            "Play lookup finished"
        );

        match source {
            Some(source) => {
                self.send_play_response(&source)?;
                Ok(Flow::Continue)
            }
            None => {
                let reason = format!("No such stream: {}", self.descriptor);
                self.reject_play(NS_PLAY_STREAM_NOT_FOUND, "No such stream.", reason)
            }
        }
    }

    /// Send an error status and close
    pub(super) fn reject_play(
        &mut self,
        code: &str,
        description: &str,
        reason: String,
    ) -> Result<Flow> {
        let status = self.play_status("error", code, description);
        self.send_status(status)?;
        Ok(Flow::Close(CloseReason::PlayRejected(reason)))
    }

    fn play_status(&self, level: &str, code: &str, description: &str) -> AmfValue {
        status_object(level, code, description)
            .with("details", self.descriptor.stream_id.as_str())
            .with("clientid", "0")
    }

    /// Greet the player and attach it to the source
    fn send_play_response(&mut self, source: &Arc<MediaSource>) -> Result<()> {
        self.send_user_control(UserControlEvent::StreamBegin(STREAM_MEDIA))?;
        let reset = self.play_status("status", NS_PLAY_RESET, "Resetting and playing.");
        self.send_status(reset)?;
        let start = self.play_status("status", NS_PLAY_START, "Started playing.");
        self.send_status(start)?;

        self.send_data(
            CMD_SAMPLE_ACCESS,
            &[AmfValue::Boolean(true), AmfValue::Boolean(true)],
        )?;
        self.send_data(
            CMD_ON_STATUS,
            &[AmfValue::object().with("code", NS_DATA_START)],
        )?;

        let notify = self.play_status("status", NS_PLAY_PUBLISH_NOTIFY, "Now published.");
        self.send_status(notify)?;
        self.send_data(CMD_ON_METADATA, &[source.metadata()])?;

        self.normalizer.reset();
        for packet in source.config_packets() {
            self.send_media(&packet)?;
        }

        // Release any previous subscription before counting readers
        self.role = Role::None;
        let subscription = source.attach_ring();
        self.role = Role::Subscriber(subscription);
        self.phase = SessionPhase::Playing;
        if source.reader_count() == 1 {
            source.seek_to(0);
        }
        self.transport.set_write_mode(WriteMode::Bulk);

        tracing::info!(
            session_id = self.id(),
            stream = %self.descriptor,
            readers = source.reader_count(),
            "Playing started"
        );
        Ok(())
    }
}
