use serde::Serialize;

use crate::types::{MessageId, ThreadId};

/// Broadcast channel used by the client components to notify views.
pub type EventBus = tokio::sync::broadcast::Sender<SessionEvent>;

/// Create an event bus with the given buffer capacity.
pub fn event_bus(capacity: usize) -> EventBus {
    let (tx, _) = tokio::sync::broadcast::channel(capacity);
    tx
}

/// Events emitted by the chat and history components.
///
/// Views subscribe to re-render; nothing in the core depends on a
/// subscriber being present.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum SessionEvent {
    // =========================================================================
    // Thread Directory
    // =========================================================================
    /// A threads snapshot replaced the local directory.
    ThreadsReplaced { count: usize },

    /// A new thread was created remotely.
    ThreadCreated { thread_id: ThreadId, title: String },

    /// An existing thread with the same title was reused.
    ThreadReused { thread_id: ThreadId },

    /// A thread was deleted.
    ThreadDeleted { thread_id: ThreadId },

    // =========================================================================
    // Session Store / Dispatcher
    // =========================================================================
    /// A messages snapshot replaced the local list of a thread.
    MessagesReplaced { thread_id: ThreadId, count: usize },

    /// The typing placeholder was appended.
    TypingStarted { thread_id: ThreadId },

    /// The assistant reply was appended.
    ReplyReceived {
        thread_id: ThreadId,
        message_id: MessageId,
    },

    /// The reply was already present locally and was not appended again.
    ReplySuppressed { thread_id: ThreadId },

    /// The completion request failed; the placeholder was removed.
    ReplyFailed { thread_id: ThreadId, reason: String },

    /// Suggested questions arrived.
    SuggestionsLoaded { count: usize },

    // =========================================================================
    // History
    // =========================================================================
    /// A history page was applied.
    HistoryPageLoaded { count: usize, reset: bool },

    /// Live sightings were merged at the head of the history list.
    HistoryLiveMerged { count: usize },
}

impl SessionEvent {
    /// Returns a stable event name for logging.
    pub fn event_name(&self) -> &'static str {
        match self {
            SessionEvent::ThreadsReplaced { .. } => "threads_replaced",
            SessionEvent::ThreadCreated { .. } => "thread_created",
            SessionEvent::ThreadReused { .. } => "thread_reused",
            SessionEvent::ThreadDeleted { .. } => "thread_deleted",
            SessionEvent::MessagesReplaced { .. } => "messages_replaced",
            SessionEvent::TypingStarted { .. } => "typing_started",
            SessionEvent::ReplyReceived { .. } => "reply_received",
            SessionEvent::ReplySuppressed { .. } => "reply_suppressed",
            SessionEvent::ReplyFailed { .. } => "reply_failed",
            SessionEvent::SuggestionsLoaded { .. } => "suggestions_loaded",
            SessionEvent::HistoryPageLoaded { .. } => "history_page_loaded",
            SessionEvent::HistoryLiveMerged { .. } => "history_live_merged",
        }
    }
}
