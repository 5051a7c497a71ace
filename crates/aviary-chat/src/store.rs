//! Session Store: per-thread message lists kept in sync with snapshots.
//!
//! Snapshots replace a thread's list wholesale. The only local-only entry is
//! the typing placeholder, which survives a snapshot and stays last.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use aviary_core::types::{ChatMessage, Sender, ThreadId};

#[derive(Debug, Default)]
pub struct SessionStore {
    threads: Mutex<HashMap<ThreadId, Vec<ChatMessage>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ThreadId, Vec<ChatMessage>>> {
        self.threads.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Messages of a thread in display order.
    pub fn messages(&self, thread_id: &ThreadId) -> Vec<ChatMessage> {
        self.lock().get(thread_id).cloned().unwrap_or_default()
    }

    /// Replace a thread's messages with a snapshot.
    ///
    /// Assistant messages repeating the content of an earlier assistant
    /// message are dropped. A placeholder present before the snapshot is
    /// re-appended. Returns the number of messages kept.
    pub fn apply_snapshot(&self, thread_id: &ThreadId, snapshot: Vec<ChatMessage>) -> usize {
        let mut threads = self.lock();

        let placeholder = threads
            .get(thread_id)
            .and_then(|msgs| msgs.iter().find(|m| m.is_typing_indicator()).cloned());

        let mut messages: Vec<ChatMessage> = Vec::with_capacity(snapshot.len() + 1);
        for message in snapshot {
            if message.is_typing_indicator() {
                continue;
            }
            let repeated = message.sender == Sender::Assistant
                && messages
                    .iter()
                    .any(|m| m.sender == Sender::Assistant && m.content == message.content);
            if !repeated {
                messages.push(message);
            }
        }
        let kept = messages.len();

        if let Some(placeholder) = placeholder {
            messages.push(placeholder);
        }
        threads.insert(thread_id.clone(), messages);
        kept
    }

    /// Append the typing placeholder, replacing any stale one.
    pub fn show_typing(&self, thread_id: &ThreadId, marker: &str) {
        let mut threads = self.lock();
        let messages = threads.entry(thread_id.clone()).or_default();
        messages.retain(|m| !m.is_typing_indicator());
        messages.push(ChatMessage::typing_indicator(marker, Utc::now()));
    }

    /// Remove the typing placeholder. Returns whether one was present.
    pub fn clear_typing(&self, thread_id: &ThreadId) -> bool {
        match self.lock().get_mut(thread_id) {
            Some(messages) => {
                let before = messages.len();
                messages.retain(|m| !m.is_typing_indicator());
                messages.len() != before
            }
            None => false,
        }
    }

    pub fn is_typing(&self, thread_id: &ThreadId) -> bool {
        self.lock()
            .get(thread_id)
            .is_some_and(|msgs| msgs.iter().any(|m| m.is_typing_indicator()))
    }

    /// Append `message` unless a message with the same content is already
    /// shown. Returns whether it was appended.
    ///
    /// Check and append happen under one lock so a racing snapshot cannot
    /// interleave.
    pub fn append_unique(&self, thread_id: &ThreadId, message: ChatMessage) -> bool {
        let mut threads = self.lock();
        let messages = threads.entry(thread_id.clone()).or_default();
        let duplicate = messages
            .iter()
            .any(|m| !m.is_typing_indicator() && m.content == message.content);
        if duplicate {
            return false;
        }

        // Keep the placeholder last.
        let position = messages
            .iter()
            .position(|m| m.is_typing_indicator())
            .unwrap_or(messages.len());
        messages.insert(position, message);
        true
    }

    /// Forget a thread's local state.
    pub fn remove_thread(&self, thread_id: &ThreadId) {
        self.lock().remove(thread_id);
    }
}
