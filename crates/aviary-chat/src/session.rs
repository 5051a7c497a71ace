//! `ChatSession`: the chat view's state and subscriptions in one place.
//!
//! The session owns the threads subscription while open and at most one
//! messages subscription, for the selected thread. Selecting another thread
//! or closing the session drops the old subscription.

use std::sync::Arc;

use chrono::{DateTime, TimeZone};
use tokio::sync::broadcast;
use tracing::{debug, info};

use aviary_client::BirdApi;
use aviary_core::config::ChatConfig;
use aviary_core::events::{EventBus, SessionEvent};
use aviary_core::types::{ChatMessage, ChatThread, ThreadId};
use aviary_core::AuthProvider;
use aviary_storage::{ChatRepository, LiveQuery};

use crate::directory::{ThreadDirectory, ThreadGroup};
use crate::dispatcher::{DispatchOutcome, MessageDispatcher};
use crate::error::ChatError;
use crate::state_machine::DispatchState;
use crate::store::SessionStore;
use crate::suggestions::{SuggestionFetcher, SuggestionState};

struct SelectedThread {
    id: ThreadId,
    live: LiveQuery<ChatMessage>,
}

enum Update {
    Threads(Option<Vec<ChatThread>>),
    Messages(Option<Vec<ChatMessage>>),
}

pub struct ChatSession {
    repo: ChatRepository,
    api: Arc<dyn BirdApi>,
    auth: Arc<dyn AuthProvider>,
    events: EventBus,
    directory: Arc<ThreadDirectory>,
    store: Arc<SessionStore>,
    dispatcher: Arc<MessageDispatcher>,
    suggestions: SuggestionFetcher,
    threads_live: Option<LiveQuery<ChatThread>>,
    selected: Option<SelectedThread>,
}

impl ChatSession {
    pub fn new(
        repo: ChatRepository,
        api: Arc<dyn BirdApi>,
        auth: Arc<dyn AuthProvider>,
        events: EventBus,
        config: &ChatConfig,
    ) -> Self {
        let directory = Arc::new(ThreadDirectory::new());
        let store = Arc::new(SessionStore::new());
        let dispatcher = Arc::new(MessageDispatcher::new(
            api.clone(),
            auth.clone(),
            store.clone(),
            directory.clone(),
            events.clone(),
            config,
        ));
        let suggestions = SuggestionFetcher::new(api.clone(), events.clone());

        Self {
            repo,
            api,
            auth,
            events,
            directory,
            store,
            dispatcher,
            suggestions,
            threads_live: None,
            selected: None,
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Start the threads subscription. With no thread selected, suggestions
    /// are fetched as well.
    pub async fn open(&mut self) -> Result<(), ChatError> {
        let user_id = self.auth.current_user();
        let live = self.repo.subscribe_threads(user_id.as_deref())?;
        self.apply_threads(live.current());
        self.threads_live = Some(live);
        info!(threads = self.directory.len(), "Chat session opened");

        if self.selected.is_none() {
            self.suggestions.fetch().await;
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.threads_live.is_some()
    }

    /// Drop every subscription.
    pub fn close(&mut self) {
        self.selected = None;
        self.threads_live = None;
        debug!("Chat session closed");
    }

    /// Switch the selected thread. `None` returns to the empty chat and
    /// refreshes the suggestions.
    pub async fn select_thread(&mut self, thread_id: Option<ThreadId>) -> Result<(), ChatError> {
        if self.selected.as_ref().map(|s| &s.id) == thread_id.as_ref() {
            return Ok(());
        }

        // Unsubscribe before subscribing to the next thread.
        self.selected = None;

        match thread_id {
            Some(id) => {
                let live = self.repo.subscribe_messages(&id)?;
                self.apply_messages(&id, live.current());
                debug!(thread_id = %id, "Thread selected");
                self.selected = Some(SelectedThread { id, live });
            }
            None => {
                self.suggestions.fetch().await;
            }
        }
        Ok(())
    }

    pub fn selected_thread(&self) -> Option<&ThreadId> {
        self.selected.as_ref().map(|s| &s.id)
    }

    /// Send `text` on the selected thread, or start a new thread for it.
    pub async fn submit(&mut self, text: &str) -> Result<DispatchOutcome, ChatError> {
        let thread_id = match self.selected_thread() {
            Some(id) => id.clone(),
            None => {
                let id = self.dispatcher.create_or_reuse_thread(text).await?;
                self.select_thread(Some(id.clone())).await?;
                id
            }
        };
        self.dispatcher.send(&thread_id, text).await
    }

    /// Delete a thread remotely and drop it locally.
    pub async fn delete_thread(&mut self, thread_id: &ThreadId) -> Result<(), ChatError> {
        self.api.delete_chat(thread_id).await?;
        self.directory.remove(thread_id);
        self.store.remove_thread(thread_id);
        self.dispatcher.forget(thread_id);
        if self.selected_thread() == Some(thread_id) {
            self.select_thread(None).await?;
        }
        info!(thread_id = %thread_id, "Thread deleted");
        self.emit(SessionEvent::ThreadDeleted {
            thread_id: thread_id.clone(),
        });
        Ok(())
    }

    fn apply_threads(&self, snapshot: Vec<ChatThread>) {
        let count = snapshot.len();
        self.directory.replace(snapshot);
        self.emit(SessionEvent::ThreadsReplaced { count });
    }

    fn apply_messages(&self, thread_id: &ThreadId, snapshot: Vec<ChatMessage>) {
        let count = self.store.apply_snapshot(thread_id, snapshot);
        self.emit(SessionEvent::MessagesReplaced {
            thread_id: thread_id.clone(),
            count,
        });
    }

    /// Apply snapshots that arrived since the last call. Returns whether
    /// anything changed.
    pub fn apply_pending(&mut self) -> bool {
        let mut changed = false;

        if let Some(snapshot) = self.threads_live.as_mut().and_then(|l| l.take_pending()) {
            self.apply_threads(snapshot);
            changed = true;
        }

        let pending = self
            .selected
            .as_mut()
            .and_then(|s| s.live.take_pending().map(|snapshot| (s.id.clone(), snapshot)));
        if let Some((id, snapshot)) = pending {
            self.apply_messages(&id, snapshot);
            changed = true;
        }

        changed
    }

    /// Wait for the next snapshot on either subscription and apply it.
    ///
    /// Returns `false` when there is nothing to wait on or the store has
    /// gone away.
    pub async fn wait_for_update(&mut self) -> bool {
        if self.threads_live.is_none() && self.selected.is_none() {
            return false;
        }

        let update = tokio::select! {
            snapshot = next_snapshot(self.threads_live.as_mut()) => Update::Threads(snapshot),
            snapshot = next_snapshot(self.selected.as_mut().map(|s| &mut s.live)) => Update::Messages(snapshot),
        };

        match update {
            Update::Threads(Some(snapshot)) => {
                self.apply_threads(snapshot);
                true
            }
            Update::Messages(Some(snapshot)) => {
                match self.selected_thread().cloned() {
                    Some(id) => self.apply_messages(&id, snapshot),
                    None => return false,
                }
                true
            }
            Update::Threads(None) | Update::Messages(None) => false,
        }
    }

    pub fn threads(&self) -> Vec<ChatThread> {
        self.directory.threads()
    }

    pub fn grouped_threads<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Vec<ThreadGroup> {
        self.directory.grouped(now)
    }

    /// Messages of the selected thread, placeholder included.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.selected_thread()
            .map(|id| self.store.messages(id))
            .unwrap_or_default()
    }

    pub fn suggestions(&self) -> SuggestionState {
        self.suggestions.state()
    }

    pub fn dispatch_state(&self, thread_id: &ThreadId) -> DispatchState {
        self.dispatcher.state(thread_id)
    }

    /// Shared handle for sending while the session keeps applying snapshots.
    pub fn dispatcher(&self) -> Arc<MessageDispatcher> {
        self.dispatcher.clone()
    }
}

async fn next_snapshot<T>(live: Option<&mut LiveQuery<T>>) -> Option<Vec<T>> {
    match live {
        Some(live) => live.changed().await,
        None => std::future::pending().await,
    }
}
