//! JSON bodies and query strings of the HTTP API.
//!
//! Field names are camelCase on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use aviary_core::types::{BirdSighting, ChatThread, ThreadId};

/// `{ "data": ... }` envelope used by the list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub data: T,
}

// =============================================================================
// Chats
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListChatsParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub chat_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl From<ChatThread> for ChatSummary {
    fn from(thread: ChatThread) -> Self {
        Self {
            chat_id: thread.id.0,
            title: thread.title,
            created_at: thread.created_at,
            user_id: thread.user_id,
        }
    }
}

impl From<ChatSummary> for ChatThread {
    fn from(summary: ChatSummary) -> Self {
        Self {
            id: ThreadId::new(summary.chat_id),
            title: summary.title,
            created_at: summary.created_at,
            user_id: summary.user_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChatRequest {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChatResponse {
    pub chat_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    pub bot_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_message_id: Option<String>,
}

// =============================================================================
// Suggestions & metadata
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionsResponse {
    pub questions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BirdInfoParams {
    pub bird: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BirdInfoResponse {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeParams {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeResponse {
    pub image_url: Option<String>,
}

// =============================================================================
// Sightings
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListBirdsParams {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSightingRequest {
    pub bird: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// A sighting as exchanged over HTTP; `bird` is the species name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SightingRecord {
    pub id: String,
    pub bird: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}

impl From<BirdSighting> for SightingRecord {
    fn from(s: BirdSighting) -> Self {
        Self {
            id: s.id,
            bird: s.species,
            latitude: s.latitude,
            longitude: s.longitude,
            timestamp: s.timestamp,
        }
    }
}

impl From<SightingRecord> for BirdSighting {
    fn from(r: SightingRecord) -> Self {
        Self {
            id: r.id,
            species: r.bird,
            latitude: r.latitude,
            longitude: r.longitude,
            timestamp: r.timestamp,
        }
    }
}
