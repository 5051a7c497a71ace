//! Test doubles shared by the history unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use aviary_client::{AssistantReply, BirdApi, ClientError};
use aviary_core::types::{BirdSighting, ChatMessage, ChatThread, ThreadId};

pub(crate) fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 31, 12, 0, 0).unwrap()
}

/// A sighting `minutes_ago` minutes before [`base_time`].
pub(crate) fn sighting(id: &str, species: &str, minutes_ago: i64) -> BirdSighting {
    BirdSighting {
        id: id.to_string(),
        species: species.to_string(),
        latitude: 51.5,
        longitude: -0.1,
        timestamp: base_time() - Duration::minutes(minutes_ago),
    }
}

/// Serves the metadata endpoints only.
#[derive(Default)]
pub(crate) struct FakeApi {
    info_calls: AtomicUsize,
    failing: Mutex<HashSet<String>>,
    imageless: Mutex<HashSet<String>>,
}

impl FakeApi {
    pub fn info_calls(&self) -> usize {
        self.info_calls.load(Ordering::SeqCst)
    }

    pub fn fail_species(&self, species: &str) {
        self.failing.lock().unwrap().insert(species.to_string());
    }

    pub fn no_image_for(&self, species: &str) {
        self.imageless.lock().unwrap().insert(species.to_string());
    }

    fn not_served() -> ClientError {
        ClientError::Status {
            status: 404,
            body: "not served by this fake".to_string(),
        }
    }
}

#[async_trait]
impl BirdApi for FakeApi {
    async fn list_chats(&self, _user_id: Option<&str>) -> Result<Vec<ChatThread>, ClientError> {
        Err(Self::not_served())
    }

    async fn create_chat(
        &self,
        _title: &str,
        _user_id: Option<&str>,
    ) -> Result<ThreadId, ClientError> {
        Err(Self::not_served())
    }

    async fn delete_chat(&self, _thread_id: &ThreadId) -> Result<(), ClientError> {
        Err(Self::not_served())
    }

    async fn list_messages(&self, _thread_id: &ThreadId) -> Result<Vec<ChatMessage>, ClientError> {
        Err(Self::not_served())
    }

    async fn send_message(
        &self,
        _thread_id: &ThreadId,
        _text: &str,
    ) -> Result<AssistantReply, ClientError> {
        Err(Self::not_served())
    }

    async fn bird_questions(&self) -> Result<Vec<String>, ClientError> {
        Err(Self::not_served())
    }

    async fn bird_info(&self, species: &str) -> Result<String, ClientError> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(species) {
            return Err(ClientError::Status {
                status: 500,
                body: "lookup failed".to_string(),
            });
        }
        Ok(format!("https://birds.test/wiki/{species}"))
    }

    async fn scrape_bird_info(&self, url: &str) -> Result<Option<String>, ClientError> {
        let species = url.rsplit('/').next().unwrap_or_default();
        if self.imageless.lock().unwrap().contains(species) {
            return Ok(None);
        }
        Ok(Some(format!("https://birds.test/img/{species}.jpg")))
    }

    async fn record_sighting(
        &self,
        _species: &str,
        _latitude: f64,
        _longitude: f64,
    ) -> Result<BirdSighting, ClientError> {
        Err(Self::not_served())
    }

    async fn list_sightings(&self, _limit: Option<usize>) -> Result<Vec<BirdSighting>, ClientError> {
        Err(Self::not_served())
    }
}
