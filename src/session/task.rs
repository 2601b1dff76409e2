//! Work queued onto a session from other threads

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;

use super::CloseReason;
use crate::registry::MediaSource;

/// Which authorization a verdict answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Intent {
    Publish,
    Play,
}

impl Intent {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Intent::Publish => "publish",
            Intent::Play => "play",
        }
    }
}

/// Deferred work, executed on the session's own task in FIFO order
#[derive(Debug)]
pub(crate) enum SessionTask {
    /// Authorization answer; empty `err` grants
    Verdict {
        intent: Intent,
        err: String,
        requested_at: Instant,
    },
    /// Result of the asynchronous source lookup for play
    PlaySource {
        source: Option<Arc<MediaSource>>,
        requested_at: Instant,
    },
    /// The published stream lost its last reader
    NoneReader,
    /// Close on behalf of another component
    Shutdown(CloseReason),
}

/// Non-owning handle onto a session's task queue
///
/// Posting never keeps the session alive: once the session is gone the
/// upgrade fails and the task is discarded.
#[derive(Debug, Clone)]
pub(crate) struct TaskHandle {
    tx: mpsc::WeakUnboundedSender<SessionTask>,
}

impl TaskHandle {
    pub(crate) fn new(tx: mpsc::WeakUnboundedSender<SessionTask>) -> Self {
        Self { tx }
    }

    /// Queue a task; returns false if the session no longer exists
    pub(crate) fn post(&self, task: SessionTask) -> bool {
        match self.tx.upgrade() {
            Some(tx) => tx.send(task).is_ok(),
            None => false,
        }
    }
}
