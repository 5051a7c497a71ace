//! Suggestion Fetcher: candidate questions for an empty chat.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{info, warn};

use aviary_client::BirdApi;
use aviary_core::events::{EventBus, SessionEvent};

/// What the empty-chat view shows.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "questions", rename_all = "snake_case")]
pub enum SuggestionState {
    /// Nothing has arrived yet. A failed fetch also stays here.
    #[default]
    Loading,
    Ready(Vec<String>),
}

pub struct SuggestionFetcher {
    api: Arc<dyn BirdApi>,
    state: Mutex<SuggestionState>,
    events: EventBus,
}

impl SuggestionFetcher {
    pub fn new(api: Arc<dyn BirdApi>, events: EventBus) -> Self {
        Self {
            api,
            state: Mutex::new(SuggestionState::Loading),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SuggestionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> SuggestionState {
        self.lock().clone()
    }

    fn set_state(&self, state: SuggestionState) {
        *self.lock() = state;
    }

    /// Fetch a fresh set of questions. Results are never cached; every call
    /// goes to the service.
    pub async fn fetch(&self) -> SuggestionState {
        self.set_state(SuggestionState::Loading);

        match self.api.bird_questions().await {
            Ok(questions) => {
                info!(count = questions.len(), "Suggestions loaded");
                let _ = self.events.send(SessionEvent::SuggestionsLoaded {
                    count: questions.len(),
                });
                self.set_state(SuggestionState::Ready(questions));
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch suggestions");
            }
        }
        self.state()
    }
}
