//! Typed repositories over the document store.
//!
//! Provides ChatRepository and SightingRepository, which own the document
//! layout of the `chats`, `chats/{id}/messages` and `birds` collections.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};

use aviary_core::error::Result;
use aviary_core::types::{
    BirdSighting, ChatMessage, ChatThread, MessageId, Sender, ThreadId, UNKNOWN_SPECIES,
};

use crate::document::{Document, Fields, OrderBy, Predicate, Query};
use crate::live::LiveQuery;
use crate::store::DocumentStore;

/// Collection holding chat threads.
pub const CHATS: &str = "chats";

/// Collection holding bird sightings.
pub const BIRDS: &str = "birds";

/// Collection holding the messages of one thread.
pub fn messages_path(thread_id: &ThreadId) -> String {
    format!("{}/{}/messages", CHATS, thread_id)
}

fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

/// Drop sub-millisecond precision so returned values equal what is stored.
fn truncate_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(to_millis(at)).unwrap_or(at)
}

fn from_millis(doc: &Document, field: &str) -> Option<DateTime<Utc>> {
    doc.i64_field(field).and_then(DateTime::<Utc>::from_timestamp_millis)
}

fn object(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

// =============================================================================
// Codecs
// =============================================================================

pub fn decode_thread(doc: &Document) -> Option<ChatThread> {
    Some(ChatThread {
        id: ThreadId::new(doc.id.clone()),
        title: doc.str_field("title")?.to_string(),
        created_at: from_millis(doc, "createdAt").unwrap_or_default(),
        user_id: doc.str_field("userId").map(str::to_string),
    })
}

pub fn decode_message(doc: &Document) -> Option<ChatMessage> {
    Some(ChatMessage {
        id: MessageId::new(doc.id.clone()),
        content: doc.str_field("content")?.to_string(),
        sender: Sender::parse(doc.str_field("sender").unwrap_or_default()),
        timestamp: from_millis(doc, "timestamp").unwrap_or_default(),
    })
}

/// Decode a sighting; missing fields fall back to placeholder values.
pub fn decode_sighting(doc: &Document) -> Option<BirdSighting> {
    let species = doc
        .str_field("bird")
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_SPECIES);
    Some(BirdSighting {
        id: doc.id.clone(),
        species: species.to_string(),
        latitude: doc.f64_field("latitude").unwrap_or(0.0),
        longitude: doc.f64_field("longitude").unwrap_or(0.0),
        timestamp: from_millis(doc, "timestamp").unwrap_or_else(Utc::now),
    })
}

// =============================================================================
// Chats
// =============================================================================

/// Threads and their messages.
#[derive(Clone)]
pub struct ChatRepository {
    store: Arc<dyn DocumentStore>,
}

impl ChatRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn create_thread(&self, title: &str, user_id: Option<&str>) -> Result<ChatThread> {
        let created_at = truncate_millis(Utc::now());
        let mut fields = object(json!({
            "title": title,
            "createdAt": to_millis(created_at),
        }));
        if let Some(user_id) = user_id {
            fields.insert("userId".to_string(), Value::from(user_id));
        }
        let doc = self.store.add(CHATS, fields)?;
        Ok(ChatThread {
            id: ThreadId::new(doc.id),
            title: title.to_string(),
            created_at,
            user_id: user_id.map(str::to_string),
        })
    }

    pub fn get_thread(&self, thread_id: &ThreadId) -> Result<Option<ChatThread>> {
        Ok(self
            .store
            .get(CHATS, thread_id.as_str())?
            .as_ref()
            .and_then(decode_thread))
    }

    /// Threads newest first, optionally restricted to one user.
    pub fn list_threads(&self, user_id: Option<&str>) -> Result<Vec<ChatThread>> {
        let docs = self.store.query(CHATS, &threads_query(user_id))?;
        Ok(docs.iter().filter_map(decode_thread).collect())
    }

    /// Delete a thread together with its messages.
    pub fn delete_thread(&self, thread_id: &ThreadId) -> Result<bool> {
        self.store.delete(CHATS, thread_id.as_str())
    }

    /// Append a message to a thread.
    ///
    /// Timestamps are strictly increasing within a thread, so a reply written
    /// in the same millisecond as the question still sorts after it.
    pub fn append_message(
        &self,
        thread_id: &ThreadId,
        content: &str,
        sender: Sender,
    ) -> Result<ChatMessage> {
        let path = messages_path(thread_id);
        let last = self
            .store
            .query(&path, &Query::new().order_by(OrderBy::desc("timestamp")).limit(1))?
            .first()
            .and_then(|doc| from_millis(doc, "timestamp"));

        let mut timestamp = truncate_millis(Utc::now());
        if let Some(last) = last {
            if timestamp <= last {
                timestamp = last + Duration::milliseconds(1);
            }
        }

        let doc = self.store.add(
            &path,
            object(json!({
                "content": content,
                "sender": sender.as_str(),
                "timestamp": to_millis(timestamp),
            })),
        )?;

        Ok(ChatMessage {
            id: MessageId::new(doc.id),
            content: content.to_string(),
            sender,
            timestamp,
        })
    }

    /// Messages of a thread, oldest first.
    pub fn list_messages(&self, thread_id: &ThreadId) -> Result<Vec<ChatMessage>> {
        let docs = self.store.query(&messages_path(thread_id), &messages_query())?;
        Ok(docs.iter().filter_map(decode_message).collect())
    }

    pub fn subscribe_threads(&self, user_id: Option<&str>) -> Result<LiveQuery<ChatThread>> {
        let rx = self.store.subscribe(CHATS, threads_query(user_id))?;
        Ok(LiveQuery::new(rx, decode_thread))
    }

    pub fn subscribe_messages(&self, thread_id: &ThreadId) -> Result<LiveQuery<ChatMessage>> {
        let rx = self
            .store
            .subscribe(&messages_path(thread_id), messages_query())?;
        Ok(LiveQuery::new(rx, decode_message))
    }
}

fn threads_query(user_id: Option<&str>) -> Query {
    let query = Query::new().order_by(OrderBy::desc("createdAt"));
    match user_id {
        Some(user_id) => query.filter(Predicate::eq("userId", user_id)),
        None => query,
    }
}

fn messages_query() -> Query {
    Query::new().order_by(OrderBy::asc("timestamp"))
}

// =============================================================================
// Sightings
// =============================================================================

/// Predicates applied to sightings before paging.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SightingFilter {
    /// Exact species name; `None` or empty matches every species.
    pub species: Option<String>,
    /// Inclusive lower bound on the timestamp.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the timestamp.
    pub to: Option<DateTime<Utc>>,
}

impl SightingFilter {
    pub fn species(species: impl Into<String>) -> Self {
        Self {
            species: Some(species.into()),
            ..Self::default()
        }
    }

    fn active_species(&self) -> Option<&str> {
        self.species.as_deref().filter(|s| !s.is_empty())
    }

    fn apply(&self, mut query: Query) -> Query {
        if let Some(species) = self.active_species() {
            query = query.filter(Predicate::eq("bird", species));
        }
        if let Some(from) = self.from {
            query = query.filter(Predicate::gte("timestamp", to_millis(from)));
        }
        if let Some(to) = self.to {
            query = query.filter(Predicate::lte("timestamp", to_millis(to)));
        }
        query
    }

    /// Whether a decoded sighting satisfies the filter.
    pub fn matches(&self, sighting: &BirdSighting) -> bool {
        self.active_species().map_or(true, |s| sighting.species == s)
            && self.from.map_or(true, |from| sighting.timestamp >= from)
            && self.to.map_or(true, |to| sighting.timestamp <= to)
    }
}

/// The sightings log.
#[derive(Clone)]
pub struct SightingRepository {
    store: Arc<dyn DocumentStore>,
}

impl SightingRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Record a sighting detected now.
    pub fn record(&self, species: &str, latitude: f64, longitude: f64) -> Result<BirdSighting> {
        self.record_at(species, latitude, longitude, Utc::now())
    }

    pub fn record_at(
        &self,
        species: &str,
        latitude: f64,
        longitude: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<BirdSighting> {
        let timestamp = truncate_millis(timestamp);
        let doc = self.store.add(
            BIRDS,
            object(json!({
                "bird": species,
                "latitude": latitude,
                "longitude": longitude,
                "timestamp": to_millis(timestamp),
            })),
        )?;
        Ok(BirdSighting {
            id: doc.id,
            species: species.to_string(),
            latitude,
            longitude,
            timestamp,
        })
    }

    /// One page of sightings newest first, resuming after `after` when given.
    pub fn page(
        &self,
        filter: &SightingFilter,
        limit: usize,
        after: Option<&BirdSighting>,
    ) -> Result<Vec<BirdSighting>> {
        let mut query = filter.apply(sightings_query()).limit(limit);
        if let Some(after) = after {
            query = query.start_after(cursor_for(after));
        }
        let docs = self.store.query(BIRDS, &query)?;
        Ok(docs.iter().filter_map(decode_sighting).collect())
    }

    /// All sightings newest first, optionally capped.
    pub fn list(&self, limit: Option<usize>) -> Result<Vec<BirdSighting>> {
        let mut query = sightings_query();
        query.limit = limit;
        let docs = self.store.query(BIRDS, &query)?;
        Ok(docs.iter().filter_map(decode_sighting).collect())
    }

    pub fn latest(&self) -> Result<Option<BirdSighting>> {
        Ok(self.list(Some(1))?.into_iter().next())
    }

    /// Live view of the newest `limit` sightings matching `filter`.
    pub fn subscribe_recent(
        &self,
        filter: &SightingFilter,
        limit: usize,
    ) -> Result<LiveQuery<BirdSighting>> {
        let rx = self
            .store
            .subscribe(BIRDS, filter.apply(sightings_query()).limit(limit))?;
        Ok(LiveQuery::new(rx, decode_sighting))
    }
}

fn sightings_query() -> Query {
    Query::new().order_by(OrderBy::desc("timestamp"))
}

fn cursor_for(sighting: &BirdSighting) -> Document {
    Document::new(
        sighting.id.clone(),
        object(json!({ "timestamp": to_millis(sighting.timestamp) })),
    )
}
