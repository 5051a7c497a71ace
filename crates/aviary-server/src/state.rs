//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use aviary_core::config::AviaryConfig;
use aviary_core::error::{AviaryError, Result};
use aviary_storage::{ChatRepository, DocumentStore, SightingRepository};

use crate::llm::CompletionProvider;

/// Shared application state.
///
/// Cloned into every handler; all fields are cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AviaryConfig>,
    pub chats: ChatRepository,
    pub sightings: SightingRepository,
    pub provider: Arc<dyn CompletionProvider>,
    /// Client for fetching reference pages.
    pub http: reqwest::Client,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: AviaryConfig,
        store: Arc<dyn DocumentStore>,
        provider: Arc<dyn CompletionProvider>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.metadata.request_timeout_secs))
            .user_agent(concat!("aviary/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AviaryError::Network(e.to_string()))?;

        Ok(Self {
            config: Arc::new(config),
            chats: ChatRepository::new(store.clone()),
            sightings: SightingRepository::new(store),
            provider,
            http,
            start_time: Instant::now(),
        })
    }
}
