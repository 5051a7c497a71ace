//! reqwest implementation of [`BirdApi`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, instrument, warn};

use aviary_core::config::ClientConfig;
use aviary_core::types::{BirdSighting, ChatMessage, ChatThread, MessageId, ThreadId};

use crate::api::{AssistantReply, BirdApi};
use crate::error::ClientError;
use crate::wire::{
    BirdInfoResponse, ChatSummary, CreateChatRequest, CreateChatResponse, DataResponse,
    QuestionsResponse, RecordSightingRequest, ScrapeResponse, SendMessageRequest,
    SendMessageResponse, SightingRecord,
};

/// HTTP client for the Aviary service.
#[derive(Clone, Debug)]
pub struct HttpBirdApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBirdApi {
    /// Client with reqwest defaults (no request timeout).
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Client honouring the configured base URL and timeout.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self::with_client(client, &config.base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
        let body = Self::read_status(response).await?;
        Ok(serde_json::from_str::<T>(&body)?)
    }

    /// Check the status only; a 2xx body is returned unparsed and may be empty.
    async fn read_status(response: reqwest::Response) -> Result<String, ClientError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!(status = status.as_u16(), "Request failed");
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    async fn get<T, Q>(&self, path: &str, query: &Q) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let response = self.client.get(self.url(path)).query(query).send().await?;
        Self::read(response).await
    }

    async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        Self::read(response).await
    }
}

const NO_QUERY: &[(&str, &str)] = &[];

#[async_trait]
impl BirdApi for HttpBirdApi {
    #[instrument(level = "debug", skip(self))]
    async fn list_chats(&self, user_id: Option<&str>) -> Result<Vec<ChatThread>, ClientError> {
        let query: Vec<(&str, &str)> = user_id.map(|u| ("userId", u)).into_iter().collect();
        let response: DataResponse<Vec<ChatSummary>> = self.get("/chats", &query).await?;
        Ok(response.data.into_iter().map(ChatThread::from).collect())
    }

    #[instrument(level = "debug", skip(self))]
    async fn create_chat(
        &self,
        title: &str,
        user_id: Option<&str>,
    ) -> Result<ThreadId, ClientError> {
        let request = CreateChatRequest {
            title: title.to_string(),
            user_id: user_id.map(str::to_string),
        };
        let response: CreateChatResponse = self.post("/chats", &request).await?;
        debug!(thread_id = %response.chat_id, "Chat created");
        Ok(ThreadId::new(response.chat_id))
    }

    #[instrument(level = "debug", skip(self), fields(thread_id = %thread_id))]
    async fn delete_chat(&self, thread_id: &ThreadId) -> Result<(), ClientError> {
        let response = self
            .client
            .delete(self.url(&format!("/chats/{}", thread_id)))
            .send()
            .await?;
        Self::read_status(response).await?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self), fields(thread_id = %thread_id))]
    async fn list_messages(&self, thread_id: &ThreadId) -> Result<Vec<ChatMessage>, ClientError> {
        let response: DataResponse<Vec<ChatMessage>> = self
            .get(&format!("/chats/{}/messages", thread_id), NO_QUERY)
            .await?;
        Ok(response.data)
    }

    #[instrument(level = "debug", skip(self, text), fields(thread_id = %thread_id))]
    async fn send_message(
        &self,
        thread_id: &ThreadId,
        text: &str,
    ) -> Result<AssistantReply, ClientError> {
        let request = SendMessageRequest {
            message: text.to_string(),
        };
        let response: SendMessageResponse = self
            .post(&format!("/chats/{}/message", thread_id), &request)
            .await?;
        Ok(AssistantReply {
            content: response.bot_message,
            message_id: response
                .bot_message_id
                .map(MessageId::new)
                .unwrap_or_else(MessageId::generate),
        })
    }

    #[instrument(level = "debug", skip(self))]
    async fn bird_questions(&self) -> Result<Vec<String>, ClientError> {
        let response: QuestionsResponse = self.get("/bird-questions", NO_QUERY).await?;
        Ok(response.questions)
    }

    #[instrument(level = "debug", skip(self))]
    async fn bird_info(&self, species: &str) -> Result<String, ClientError> {
        let response: BirdInfoResponse = self.get("/bird-info", &[("bird", species)]).await?;
        Ok(response.url)
    }

    #[instrument(level = "debug", skip(self))]
    async fn scrape_bird_info(&self, url: &str) -> Result<Option<String>, ClientError> {
        let response: ScrapeResponse = self.get("/scrape-bird-info", &[("url", url)]).await?;
        Ok(response.image_url)
    }

    #[instrument(level = "debug", skip(self))]
    async fn record_sighting(
        &self,
        species: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<BirdSighting, ClientError> {
        let request = RecordSightingRequest {
            bird: species.to_string(),
            latitude,
            longitude,
        };
        let record: SightingRecord = self.post("/birds", &request).await?;
        Ok(record.into())
    }

    #[instrument(level = "debug", skip(self))]
    async fn list_sightings(&self, limit: Option<usize>) -> Result<Vec<BirdSighting>, ClientError> {
        let limit = limit.map(|l| l.to_string());
        let query: Vec<(&str, &str)> = limit.as_deref().map(|l| ("limit", l)).into_iter().collect();
        let response: DataResponse<Vec<SightingRecord>> = self.get("/birds", &query).await?;
        Ok(response.data.into_iter().map(BirdSighting::from).collect())
    }
}
