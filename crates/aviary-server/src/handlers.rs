//! Route handler functions for all API endpoints.
//!
//! Each handler extracts query/path parameters via axum extractors, works
//! against the repositories in AppState and returns JSON responses.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use aviary_client::wire::{
    BirdInfoParams, BirdInfoResponse, ChatSummary, CreateChatRequest, CreateChatResponse,
    DataResponse, ListBirdsParams, ListChatsParams, QuestionsResponse, RecordSightingRequest,
    ScrapeParams, ScrapeResponse, SendMessageRequest, SendMessageResponse, SightingRecord,
};
use aviary_core::types::{ChatMessage, Sender, ThreadId};

use crate::error::ApiError;
use crate::metadata::{extract_og_image, reference_url};
use crate::state::AppState;

/// Upper bound on `GET /birds?limit=`.
const MAX_SIGHTINGS_LIMIT: usize = 1000;

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub provider: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteChatResponse {
    pub deleted: bool,
    pub chat_id: String,
}

// =============================================================================
// Health
// =============================================================================

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        provider: state.provider.name().to_string(),
    })
}

// =============================================================================
// Chats
// =============================================================================

/// GET /chats - threads newest first, optionally for one user.
pub async fn list_chats(
    State(state): State<AppState>,
    Query(params): Query<ListChatsParams>,
) -> Result<Json<DataResponse<Vec<ChatSummary>>>, ApiError> {
    let user_id = params.user_id.as_deref().filter(|u| !u.is_empty());
    let threads = state.chats.list_threads(user_id)?;
    Ok(Json(DataResponse {
        data: threads.into_iter().map(ChatSummary::from).collect(),
    }))
}

/// POST /chats
pub async fn create_chat(
    State(state): State<AppState>,
    Json(request): Json<CreateChatRequest>,
) -> Result<(StatusCode, Json<CreateChatResponse>), ApiError> {
    if request.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Field 'title' must not be empty".to_string()));
    }
    let thread = state
        .chats
        .create_thread(&request.title, request.user_id.as_deref())?;
    info!(thread_id = %thread.id, title = %thread.title, "Chat created");
    Ok((
        StatusCode::CREATED,
        Json(CreateChatResponse {
            chat_id: thread.id.0,
        }),
    ))
}

/// DELETE /chats/{id} - removes the thread and its messages.
pub async fn delete_chat(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
) -> Result<Json<DeleteChatResponse>, ApiError> {
    let thread_id = ThreadId::new(chat_id);
    if !state.chats.delete_thread(&thread_id)? {
        return Err(ApiError::NotFound(format!("Chat '{}' not found", thread_id)));
    }
    info!(thread_id = %thread_id, "Chat deleted");
    Ok(Json(DeleteChatResponse {
        deleted: true,
        chat_id: thread_id.0,
    }))
}

/// GET /chats/{id}/messages - oldest first.
pub async fn list_messages(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
) -> Result<Json<DataResponse<Vec<ChatMessage>>>, ApiError> {
    let thread_id = ThreadId::new(chat_id);
    require_thread(&state, &thread_id)?;
    let messages = state.chats.list_messages(&thread_id)?;
    Ok(Json(DataResponse { data: messages }))
}

/// POST /chats/{id}/message - store the user message, ask the provider and
/// store its reply.
pub async fn send_message(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    let thread_id = ThreadId::new(chat_id);
    if request.message.trim().is_empty() {
        return Err(ApiError::BadRequest("Field 'message' must not be empty".to_string()));
    }
    require_thread(&state, &thread_id)?;

    state
        .chats
        .append_message(&thread_id, &request.message, Sender::User)?;

    let reply = match state.provider.complete(&request.message).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!(thread_id = %thread_id, provider = state.provider.name(), error = %e, "Completion failed");
            return Err(e.into());
        }
    };

    let stored = state
        .chats
        .append_message(&thread_id, &reply, Sender::Assistant)?;
    debug!(thread_id = %thread_id, message_id = %stored.id, "Assistant reply stored");

    Ok(Json(SendMessageResponse {
        bot_message: stored.content,
        bot_message_id: Some(stored.id.0),
    }))
}

fn require_thread(state: &AppState, thread_id: &ThreadId) -> Result<(), ApiError> {
    match state.chats.get_thread(thread_id)? {
        Some(_) => Ok(()),
        None => Err(ApiError::NotFound(format!("Chat '{}' not found", thread_id))),
    }
}

// =============================================================================
// Suggestions & metadata
// =============================================================================

/// GET /bird-questions - a random sample of the configured pool.
pub async fn bird_questions(State(state): State<AppState>) -> Json<QuestionsResponse> {
    let chat = &state.config.chat;
    Json(QuestionsResponse {
        questions: sample_questions(&chat.question_pool, chat.suggestion_count),
    })
}

fn sample_questions(pool: &[String], count: usize) -> Vec<String> {
    pool.choose_multiple(&mut rand::rng(), count)
        .cloned()
        .collect()
}

/// GET /bird-info?bird= - reference page for a species.
pub async fn bird_info(
    State(state): State<AppState>,
    Query(params): Query<BirdInfoParams>,
) -> Result<Json<BirdInfoResponse>, ApiError> {
    if params.bird.trim().is_empty() {
        return Err(ApiError::BadRequest("Parameter 'bird' must not be empty".to_string()));
    }
    Ok(Json(BirdInfoResponse {
        url: reference_url(&state.config.metadata.reference_base_url, &params.bird),
    }))
}

/// GET /scrape-bird-info?url= - the page's `og:image`, if any.
pub async fn scrape_bird_info(
    State(state): State<AppState>,
    Query(params): Query<ScrapeParams>,
) -> Result<Json<ScrapeResponse>, ApiError> {
    if !(params.url.starts_with("http://") || params.url.starts_with("https://")) {
        return Err(ApiError::BadRequest(format!(
            "Parameter 'url' must be an http(s) URL, got '{}'",
            params.url
        )));
    }

    let response = state
        .http
        .get(&params.url)
        .send()
        .await
        .map_err(|e| ApiError::BadGateway(format!("Failed to fetch {}: {}", params.url, e)))?;
    let status = response.status();
    if !status.is_success() {
        return Err(ApiError::BadGateway(format!(
            "Fetching {} returned {}",
            params.url, status
        )));
    }
    let html = response
        .text()
        .await
        .map_err(|e| ApiError::BadGateway(format!("Failed to read {}: {}", params.url, e)))?;

    let image_url = extract_og_image(&html);
    debug!(url = %params.url, found = image_url.is_some(), "Scraped reference page");
    Ok(Json(ScrapeResponse { image_url }))
}

// =============================================================================
// Sightings
// =============================================================================

/// GET /birds - sightings newest first.
pub async fn list_birds(
    State(state): State<AppState>,
    Query(params): Query<ListBirdsParams>,
) -> Result<Json<DataResponse<Vec<SightingRecord>>>, ApiError> {
    let limit = params.limit.map(|l| l.clamp(1, MAX_SIGHTINGS_LIMIT));
    let sightings = state.sightings.list(limit)?;
    Ok(Json(DataResponse {
        data: sightings.into_iter().map(SightingRecord::from).collect(),
    }))
}

/// GET /birds/latest
pub async fn latest_bird(
    State(state): State<AppState>,
) -> Result<Json<DataResponse<Option<SightingRecord>>>, ApiError> {
    let latest = state.sightings.latest()?;
    Ok(Json(DataResponse {
        data: latest.map(SightingRecord::from),
    }))
}

/// POST /birds - ingest one detection.
pub async fn record_bird(
    State(state): State<AppState>,
    Json(request): Json<RecordSightingRequest>,
) -> Result<(StatusCode, Json<SightingRecord>), ApiError> {
    if request.bird.trim().is_empty() {
        return Err(ApiError::BadRequest("Field 'bird' must not be empty".to_string()));
    }
    if !(-90.0..=90.0).contains(&request.latitude) || !(-180.0..=180.0).contains(&request.longitude) {
        return Err(ApiError::BadRequest(format!(
            "Coordinates out of range: ({}, {})",
            request.latitude, request.longitude
        )));
    }

    let sighting = state
        .sightings
        .record(request.bird.trim(), request.latitude, request.longitude)?;
    info!(species = %sighting.species, id = %sighting.id, "Sighting recorded");
    Ok((StatusCode::CREATED, Json(sighting.into())))
}
