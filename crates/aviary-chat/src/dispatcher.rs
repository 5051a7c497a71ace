//! Message Dispatcher: sends user messages and reconciles the replies.
//!
//! Each send shows a local typing placeholder, posts the message, and then
//! swaps the placeholder for the reply unless the same content is already
//! shown (the messages subscription may have delivered it first). Failures
//! remove the placeholder and are logged; there is no retry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::{debug, info, warn};

use aviary_client::BirdApi;
use aviary_core::config::ChatConfig;
use aviary_core::events::{EventBus, SessionEvent};
use aviary_core::types::{derive_title, ChatMessage, ChatThread, MessageId, Sender, ThreadId};
use aviary_core::AuthProvider;

use crate::directory::ThreadDirectory;
use crate::error::ChatError;
use crate::state_machine::{validate_transition, DispatchState};
use crate::store::SessionStore;

/// How a send settled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The reply was appended.
    Delivered(MessageId),
    /// The reply was already shown and was not appended again.
    Suppressed,
    /// The request failed; nothing was appended.
    Failed(String),
}

pub struct MessageDispatcher {
    api: Arc<dyn BirdApi>,
    auth: Arc<dyn AuthProvider>,
    store: Arc<SessionStore>,
    directory: Arc<ThreadDirectory>,
    states: Mutex<HashMap<ThreadId, DispatchState>>,
    events: EventBus,
    typing_marker: String,
    title_max_chars: usize,
}

impl MessageDispatcher {
    pub fn new(
        api: Arc<dyn BirdApi>,
        auth: Arc<dyn AuthProvider>,
        store: Arc<SessionStore>,
        directory: Arc<ThreadDirectory>,
        events: EventBus,
        config: &ChatConfig,
    ) -> Self {
        Self {
            api,
            auth,
            store,
            directory,
            states: Mutex::new(HashMap::new()),
            events,
            typing_marker: config.typing_marker.clone(),
            title_max_chars: config.title_max_chars,
        }
    }

    fn states(&self) -> MutexGuard<'_, HashMap<ThreadId, DispatchState>> {
        self.states.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current dispatch state of a thread.
    pub fn state(&self, thread_id: &ThreadId) -> DispatchState {
        self.states()
            .get(thread_id)
            .copied()
            .unwrap_or(DispatchState::Idle)
    }

    /// Drop the dispatch state of a thread that no longer exists.
    pub fn forget(&self, thread_id: &ThreadId) {
        self.states().remove(thread_id);
    }

    fn transition(&self, thread_id: &ThreadId, to: DispatchState) -> Result<(), ChatError> {
        let mut states = self.states();
        let from = states.get(thread_id).copied().unwrap_or(DispatchState::Idle);
        validate_transition(from, to)?;
        states.insert(thread_id.clone(), to);
        debug!(thread_id = %thread_id, ?from, ?to, "Dispatch state changed");
        Ok(())
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    /// Send `text` on an existing thread and reconcile the reply.
    ///
    /// Network failures are reported through [`DispatchOutcome::Failed`];
    /// errors are reserved for empty input and a send already in flight.
    pub async fn send(&self, thread_id: &ThreadId, text: &str) -> Result<DispatchOutcome, ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        self.transition(thread_id, DispatchState::Sending)?;
        self.store.show_typing(thread_id, &self.typing_marker);
        self.emit(SessionEvent::TypingStarted {
            thread_id: thread_id.clone(),
        });
        self.transition(thread_id, DispatchState::AwaitingResponse)?;

        match self.api.send_message(thread_id, text).await {
            Ok(reply) => {
                self.store.clear_typing(thread_id);
                let message_id = reply.message_id.clone();
                let message = ChatMessage {
                    id: reply.message_id,
                    content: reply.content,
                    sender: Sender::Assistant,
                    timestamp: Utc::now(),
                };

                let outcome = if self.store.append_unique(thread_id, message) {
                    info!(thread_id = %thread_id, message_id = %message_id, "Assistant reply received");
                    self.emit(SessionEvent::ReplyReceived {
                        thread_id: thread_id.clone(),
                        message_id: message_id.clone(),
                    });
                    DispatchOutcome::Delivered(message_id)
                } else {
                    debug!(thread_id = %thread_id, "Reply already shown, not appended");
                    self.emit(SessionEvent::ReplySuppressed {
                        thread_id: thread_id.clone(),
                    });
                    DispatchOutcome::Suppressed
                };

                self.transition(thread_id, DispatchState::Resolved)?;
                Ok(outcome)
            }
            Err(e) => {
                self.store.clear_typing(thread_id);
                warn!(thread_id = %thread_id, error = %e, "Failed to get assistant reply");
                self.emit(SessionEvent::ReplyFailed {
                    thread_id: thread_id.clone(),
                    reason: e.to_string(),
                });
                self.transition(thread_id, DispatchState::Failed)?;
                Ok(DispatchOutcome::Failed(e.to_string()))
            }
        }
    }

    /// Find the thread a first message belongs to, creating it if needed.
    ///
    /// The title is the first characters of `text`; a local thread with the
    /// same title is reused.
    pub async fn create_or_reuse_thread(&self, text: &str) -> Result<ThreadId, ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let title = derive_title(text, self.title_max_chars);
        if let Some(existing) = self.directory.find_by_title(&title) {
            info!(thread_id = %existing.id, "Reusing thread with the same title");
            self.emit(SessionEvent::ThreadReused {
                thread_id: existing.id.clone(),
            });
            return Ok(existing.id);
        }

        let user_id = self.auth.current_user();
        let thread_id = self.api.create_chat(&title, user_id.as_deref()).await?;
        info!(thread_id = %thread_id, "Thread created");

        self.directory.insert(ChatThread {
            id: thread_id.clone(),
            title: title.clone(),
            created_at: Utc::now(),
            user_id,
        });
        self.emit(SessionEvent::ThreadCreated {
            thread_id: thread_id.clone(),
            title,
        });
        Ok(thread_id)
    }

    /// Open a thread for `text` and send it.
    ///
    /// Returns `None` when the thread could not be created. A failed send
    /// still returns the thread.
    pub async fn start_new_chat(&self, text: &str) -> Option<ThreadId> {
        let thread_id = match self.create_or_reuse_thread(text).await {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "Failed to start chat");
                return None;
            }
        };

        if let Err(e) = self.send(&thread_id, text).await {
            warn!(thread_id = %thread_id, error = %e, "Send rejected");
        }
        Some(thread_id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::testing::FakeApi;
    use aviary_core::events::event_bus;
    use aviary_core::StaticAuth;
    use tokio::sync::broadcast;

    struct Harness {
        api: Arc<FakeApi>,
        store: Arc<SessionStore>,
        directory: Arc<ThreadDirectory>,
        dispatcher: Arc<MessageDispatcher>,
        events: broadcast::Receiver<SessionEvent>,
    }

    fn harness() -> Harness {
        harness_with_auth(StaticAuth::signed_in("user-1"))
    }

    fn harness_with_auth(auth: StaticAuth) -> Harness {
        let api = Arc::new(FakeApi::new());
        let store = Arc::new(SessionStore::new());
        let directory = Arc::new(ThreadDirectory::new());
        let bus = event_bus(64);
        let events = bus.subscribe();
        let dispatcher = Arc::new(MessageDispatcher::new(
            api.clone(),
            Arc::new(auth),
            store.clone(),
            directory.clone(),
            bus,
            &ChatConfig::default(),
        ));
        Harness {
            api,
            store,
            directory,
            dispatcher,
            events,
        }
    }

    fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn assistant_count(store: &SessionStore, thread_id: &ThreadId, content: &str) -> usize {
        store
            .messages(thread_id)
            .iter()
            .filter(|m| m.sender == Sender::Assistant && !m.is_typing_indicator() && m.content == content)
            .count()
    }

    // =========================================================================
    // send
    // =========================================================================

    #[tokio::test]
    async fn test_send_appends_reply_and_clears_placeholder() {
        let mut h = harness();
        let thread = h.api.repo.create_thread("Robins", None).unwrap();

        let outcome = h.dispatcher.send(&thread.id, "What does a robin eat?").await.unwrap();
        assert!(matches!(outcome, DispatchOutcome::Delivered(_)));
        assert!(!h.store.is_typing(&thread.id));
        assert_eq!(assistant_count(&h.store, &thread.id, "Robins eat worms and berries."), 1);
        assert_eq!(h.dispatcher.state(&thread.id), DispatchState::Resolved);

        let names: Vec<&str> = drain(&mut h.events).iter().map(|e| e.event_name()).collect();
        assert_eq!(names, vec!["typing_started", "reply_received"]);
    }

    #[tokio::test]
    async fn test_forget_resets_thread_state() {
        let h = harness();
        let thread = h.api.repo.create_thread("Robins", None).unwrap();
        h.dispatcher.send(&thread.id, "What does a robin eat?").await.unwrap();
        assert_eq!(h.dispatcher.state(&thread.id), DispatchState::Resolved);

        h.dispatcher.forget(&thread.id);
        assert_eq!(h.dispatcher.state(&thread.id), DispatchState::Idle);
        assert!(h.dispatcher.states().is_empty());
    }

    #[tokio::test]
    async fn test_send_failure_removes_placeholder_without_retry() {
        let mut h = harness();
        h.api.fail_send.store(true, Ordering::SeqCst);
        let thread_id = ThreadId::new("t1");

        let outcome = h.dispatcher.send(&thread_id, "hello").await.unwrap();
        assert!(matches!(outcome, DispatchOutcome::Failed(_)));
        assert!(h.store.messages(&thread_id).is_empty());
        assert_eq!(h.api.sends.load(Ordering::SeqCst), 1);
        assert_eq!(h.dispatcher.state(&thread_id), DispatchState::Failed);

        let names: Vec<&str> = drain(&mut h.events).iter().map(|e| e.event_name()).collect();
        assert_eq!(names, vec!["typing_started", "reply_failed"]);

        // The next send is allowed after a failure.
        h.api.fail_send.store(false, Ordering::SeqCst);
        let outcome = h.dispatcher.send(&thread_id, "hello again").await.unwrap();
        assert!(matches!(outcome, DispatchOutcome::Delivered(_)));
    }

    #[tokio::test]
    async fn test_repeated_send_never_duplicates_reply_content() {
        let h = harness();
        h.api.persist.store(false, Ordering::SeqCst);
        let thread_id = ThreadId::new("t1");

        for _ in 0..3 {
            h.dispatcher.send(&thread_id, "What does a robin eat?").await.unwrap();
        }
        assert_eq!(assistant_count(&h.store, &thread_id, "Robins eat worms and berries."), 1);
    }

    #[tokio::test]
    async fn test_snapshot_before_response_suppresses_reply() {
        let h = harness();
        let thread = h.api.repo.create_thread("Robins", None).unwrap();
        let gate = h.api.hold_responses();

        let dispatcher = h.dispatcher.clone();
        let thread_id = thread.id.clone();
        let task = tokio::spawn(async move { dispatcher.send(&thread_id, "What does a robin eat?").await });

        // The subscription delivers the persisted reply first.
        h.api.persisted.notified().await;
        let snapshot = h.api.repo.list_messages(&thread.id).unwrap();
        h.store.apply_snapshot(&thread.id, snapshot);
        let shown = h.store.messages(&thread.id);
        assert_eq!(shown.len(), 3);
        assert!(shown[2].is_typing_indicator());

        gate.notify_one();
        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, DispatchOutcome::Suppressed);
        assert_eq!(assistant_count(&h.store, &thread.id, "Robins eat worms and berries."), 1);
        assert!(!h.store.is_typing(&thread.id));
    }

    #[tokio::test]
    async fn test_second_send_while_in_flight_is_rejected() {
        let h = harness();
        let gate = h.api.hold_responses();
        let thread_id = ThreadId::new("t1");

        let dispatcher = h.dispatcher.clone();
        let id = thread_id.clone();
        let task = tokio::spawn(async move { dispatcher.send(&id, "first").await });
        h.api.persisted.notified().await;

        let err = h.dispatcher.send(&thread_id, "second").await.unwrap_err();
        assert!(matches!(
            err,
            ChatError::InvalidTransition(DispatchState::AwaitingResponse, DispatchState::Sending)
        ));
        // Still exactly one placeholder.
        let placeholders = h
            .store
            .messages(&thread_id)
            .iter()
            .filter(|m| m.is_typing_indicator())
            .count();
        assert_eq!(placeholders, 1);

        gate.notify_one();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let h = harness();
        let err = h.dispatcher.send(&ThreadId::new("t1"), "   ").await.unwrap_err();
        assert!(matches!(err, ChatError::EmptyMessage));
        assert_eq!(h.api.sends.load(Ordering::SeqCst), 0);
    }

    // =========================================================================
    // start_new_chat
    // =========================================================================

    #[tokio::test]
    async fn test_start_new_chat_creates_one_thread_and_one_reply() {
        let mut h = harness();
        let thread_id = h
            .dispatcher
            .start_new_chat("What does a robin eat?")
            .await
            .unwrap();

        let threads = h.api.repo.list_threads(None).unwrap();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].id, thread_id);
        assert_eq!(threads[0].title, "What does a robin eat?");
        assert_eq!(threads[0].user_id.as_deref(), Some("user-1"));
        assert_eq!(h.directory.len(), 1);

        let events = drain(&mut h.events);
        let typing = events
            .iter()
            .filter(|e| matches!(e, SessionEvent::TypingStarted { .. }))
            .count();
        assert_eq!(typing, 1);
        assert_eq!(assistant_count(&h.store, &thread_id, "Robins eat worms and berries."), 1);
    }

    #[tokio::test]
    async fn test_start_new_chat_truncates_title() {
        let h = harness();
        let text = "How can I attract hummingbirds to my garden in early spring?";
        let thread_id = h.dispatcher.start_new_chat(text).await.unwrap();
        let thread = h.api.repo.get_thread(&thread_id).unwrap().unwrap();
        assert_eq!(thread.title, "How can I attract hummingbirds");
        assert_eq!(thread.title.chars().count(), 30);
    }

    #[tokio::test]
    async fn test_start_new_chat_reuses_thread_with_same_title() {
        let h = harness();
        let first = h.dispatcher.start_new_chat("What does a robin eat?").await.unwrap();
        let second = h.dispatcher.start_new_chat("What does a robin eat?").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(h.api.creates.load(Ordering::SeqCst), 1);
        assert_eq!(h.api.sends.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_start_new_chat_creation_failure_returns_none() {
        let h = harness_with_auth(StaticAuth::anonymous());
        h.api.fail_create.store(true, Ordering::SeqCst);
        assert!(h.dispatcher.start_new_chat("hello").await.is_none());
        assert_eq!(h.api.sends.load(Ordering::SeqCst), 0);
        assert!(h.directory.is_empty());
    }

    #[tokio::test]
    async fn test_start_new_chat_anonymous_has_no_user() {
        let h = harness_with_auth(StaticAuth::anonymous());
        let thread_id = h.dispatcher.start_new_chat("Owls?").await.unwrap();
        let thread = h.api.repo.get_thread(&thread_id).unwrap().unwrap();
        assert!(thread.user_id.is_none());
    }
}
