//! Source hooks installed by a publishing session
//!
//! The media bus calls these from arbitrary threads; every action is
//! re-queued onto the owning session instead of touching it directly.

use super::task::{SessionTask, TaskHandle};
use super::CloseReason;
use crate::registry::{MediaSource, SourceListener};

pub(crate) struct PublisherHooks {
    tasks: TaskHandle,
}

impl PublisherHooks {
    pub(crate) fn new(tasks: TaskHandle) -> Self {
        Self { tasks }
    }
}

impl SourceListener for PublisherHooks {
    /// A live push cannot be repositioned
    fn seek_to(&self, _source: &MediaSource, _stamp_ms: u32) -> bool {
        false
    }

    fn close(&self, source: &MediaSource, force: bool) -> bool {
        if !force && source.reader_count() != 0 {
            return false;
        }
        let reason = CloseReason::Kicked(format!("close media: {} {}", source.key(), force));
        self.tasks.post(SessionTask::Shutdown(reason))
    }

    fn on_none_reader(&self, source: &MediaSource) {
        if source.reader_count() == 0 {
            self.tasks.post(SessionTask::NoneReader);
        }
    }
}
