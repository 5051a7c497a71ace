//! In-process stand-in for the Aviary service, used by the unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use aviary_client::{AssistantReply, BirdApi, ClientError};
use aviary_core::types::{BirdSighting, ChatMessage, ChatThread, MessageId, Sender, ThreadId};
use aviary_storage::{ChatRepository, DocumentStore, SqliteDocumentStore};

/// Persists like the real service does: the user message and the reply are
/// written to the shared store before the HTTP response returns.
pub(crate) struct FakeApi {
    pub store: Arc<dyn DocumentStore>,
    pub repo: ChatRepository,
    pub reply: Mutex<String>,
    pub persist: AtomicBool,
    pub fail_send: AtomicBool,
    pub fail_create: AtomicBool,
    pub fail_questions: AtomicBool,
    pub sends: AtomicUsize,
    pub creates: AtomicUsize,
    pub question_calls: AtomicUsize,
    /// Signalled once the reply has been persisted.
    pub persisted: Notify,
    /// When set, the response is withheld until notified.
    pub hold: Mutex<Option<Arc<Notify>>>,
}

impl FakeApi {
    pub fn new() -> Self {
        let store: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::in_memory().unwrap());
        Self {
            repo: ChatRepository::new(store.clone()),
            store,
            reply: Mutex::new("Robins eat worms and berries.".to_string()),
            persist: AtomicBool::new(true),
            fail_send: AtomicBool::new(false),
            fail_create: AtomicBool::new(false),
            fail_questions: AtomicBool::new(false),
            sends: AtomicUsize::new(0),
            creates: AtomicUsize::new(0),
            question_calls: AtomicUsize::new(0),
            persisted: Notify::new(),
            hold: Mutex::new(None),
        }
    }

    pub fn hold_responses(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.hold.lock().unwrap() = Some(gate.clone());
        gate
    }

    fn unavailable() -> ClientError {
        ClientError::Status {
            status: 502,
            body: "unavailable".to_string(),
        }
    }
}

#[async_trait]
impl BirdApi for FakeApi {
    async fn list_chats(&self, user_id: Option<&str>) -> Result<Vec<ChatThread>, ClientError> {
        Ok(self.repo.list_threads(user_id).unwrap())
    }

    async fn create_chat(
        &self,
        title: &str,
        user_id: Option<&str>,
    ) -> Result<ThreadId, ClientError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(self.repo.create_thread(title, user_id).unwrap().id)
    }

    async fn delete_chat(&self, thread_id: &ThreadId) -> Result<(), ClientError> {
        self.repo.delete_thread(thread_id).unwrap();
        Ok(())
    }

    async fn list_messages(&self, thread_id: &ThreadId) -> Result<Vec<ChatMessage>, ClientError> {
        Ok(self.repo.list_messages(thread_id).unwrap())
    }

    async fn send_message(
        &self,
        thread_id: &ThreadId,
        text: &str,
    ) -> Result<AssistantReply, ClientError> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }

        let content = self.reply.lock().unwrap().clone();
        let message_id = if self.persist.load(Ordering::SeqCst) {
            self.repo
                .append_message(thread_id, text, Sender::User)
                .unwrap();
            self.repo
                .append_message(thread_id, &content, Sender::Assistant)
                .unwrap()
                .id
        } else {
            MessageId::generate()
        };
        self.persisted.notify_one();

        let gate = self.hold.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        Ok(AssistantReply {
            content,
            message_id,
        })
    }

    async fn bird_questions(&self) -> Result<Vec<String>, ClientError> {
        self.question_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_questions.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(vec![
            "What does a robin eat?".to_string(),
            "Why do birds migrate?".to_string(),
            "What is the fastest bird in the world?".to_string(),
        ])
    }

    async fn bird_info(&self, species: &str) -> Result<String, ClientError> {
        Ok(format!("https://en.wikipedia.org/wiki/{}", species))
    }

    async fn scrape_bird_info(&self, _url: &str) -> Result<Option<String>, ClientError> {
        Ok(None)
    }

    async fn record_sighting(
        &self,
        _species: &str,
        _latitude: f64,
        _longitude: f64,
    ) -> Result<BirdSighting, ClientError> {
        Err(Self::unavailable())
    }

    async fn list_sightings(&self, _limit: Option<usize>) -> Result<Vec<BirdSighting>, ClientError> {
        Ok(Vec::new())
    }
}
