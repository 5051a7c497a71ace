use async_trait::async_trait;

use aviary_core::types::{BirdSighting, ChatMessage, ChatThread, MessageId, ThreadId};

use crate::error::ClientError;

/// The assistant's answer to one user message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssistantReply {
    pub content: String,
    pub message_id: MessageId,
}

/// Remote operations of the Aviary service.
#[async_trait]
pub trait BirdApi: Send + Sync {
    /// Threads newest first, scoped to `user_id` when given.
    async fn list_chats(&self, user_id: Option<&str>) -> Result<Vec<ChatThread>, ClientError>;

    async fn create_chat(
        &self,
        title: &str,
        user_id: Option<&str>,
    ) -> Result<ThreadId, ClientError>;

    /// Delete a thread and its messages.
    async fn delete_chat(&self, thread_id: &ThreadId) -> Result<(), ClientError>;

    async fn list_messages(&self, thread_id: &ThreadId) -> Result<Vec<ChatMessage>, ClientError>;

    /// Post a user message and wait for the assistant's reply.
    async fn send_message(
        &self,
        thread_id: &ThreadId,
        text: &str,
    ) -> Result<AssistantReply, ClientError>;

    /// Suggested questions for an empty chat.
    async fn bird_questions(&self) -> Result<Vec<String>, ClientError>;

    /// Reference page URL for a species.
    async fn bird_info(&self, species: &str) -> Result<String, ClientError>;

    /// Image URL advertised by a reference page, if it has one.
    async fn scrape_bird_info(&self, url: &str) -> Result<Option<String>, ClientError>;

    async fn record_sighting(
        &self,
        species: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<BirdSighting, ClientError>;

    /// Sightings newest first.
    async fn list_sightings(&self, limit: Option<usize>) -> Result<Vec<BirdSighting>, ClientError>;
}
