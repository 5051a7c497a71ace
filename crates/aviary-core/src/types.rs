use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of the local-only placeholder shown while the assistant replies.
pub const TYPING_INDICATOR_ID: &str = "typing-indicator";

/// Species name used when a stored sighting carries none.
pub const UNKNOWN_SPECIES: &str = "Unknown Bird";

// =============================================================================
// Enums
// =============================================================================

/// Author of a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "assistant",
        }
    }

    /// Parse a stored sender value. Anything unrecognised is treated as the user.
    pub fn parse(value: &str) -> Self {
        match value {
            "assistant" | "bot" => Sender::Assistant,
            _ => Sender::User,
        }
    }
}

// =============================================================================
// Newtype Wrappers - Identity
// =============================================================================

/// Opaque identifier of a chat thread.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub String);

impl ThreadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ThreadId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ThreadId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Opaque identifier of a chat message.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random id for messages created locally.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn typing_indicator() -> Self {
        Self(TYPING_INDICATOR_ID.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Chat
// =============================================================================

/// A single chat conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatThread {
    pub id: ThreadId,
    pub title: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Derive a thread title from the first message by keeping at most
/// `max_chars` characters.
pub fn derive_title(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// A message inside a thread.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: MessageId,
    pub content: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Build the transient "assistant is composing" placeholder.
    pub fn typing_indicator(marker: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: MessageId::typing_indicator(),
            content: marker.to_string(),
            sender: Sender::Assistant,
            timestamp,
        }
    }

    pub fn is_typing_indicator(&self) -> bool {
        self.id.as_str() == TYPING_INDICATOR_ID
    }
}

// =============================================================================
// Sightings
// =============================================================================

/// One detection in the sightings log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BirdSighting {
    pub id: String,
    pub species: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}

/// Display metadata for a species, looked up once per session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BirdMetadata {
    pub image_url: Option<String>,
    pub reference_url: Option<String>,
}

impl BirdMetadata {
    /// Entry cached after a failed lookup so it is not retried.
    pub fn fallback() -> Self {
        Self::default()
    }

    pub fn is_fallback(&self) -> bool {
        self.image_url.is_none() && self.reference_url.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Sender::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Sender::Assistant).unwrap(),
            "\"assistant\""
        );
    }

    #[test]
    fn test_sender_parse() {
        assert_eq!(Sender::parse("assistant"), Sender::Assistant);
        assert_eq!(Sender::parse("bot"), Sender::Assistant);
        assert_eq!(Sender::parse("user"), Sender::User);
        assert_eq!(Sender::parse(""), Sender::User);
    }

    #[test]
    fn test_derive_title_truncates_to_char_count() {
        let text = "What does a robin eat during the winter months?";
        let title = derive_title(text, 30);
        assert_eq!(title.chars().count(), 30);
        assert_eq!(title, "What does a robin eat during t");
    }

    #[test]
    fn test_derive_title_short_text_unchanged() {
        assert_eq!(derive_title("Hi", 30), "Hi");
        assert_eq!(derive_title("", 30), "");
    }

    #[test]
    fn test_derive_title_multibyte_safe() {
        let text = "Où niche le héron cendré en été ?";
        let title = derive_title(text, 10);
        assert_eq!(title.chars().count(), 10);
        assert_eq!(title, "Où niche l");
    }

    #[test]
    fn test_typing_indicator() {
        let msg = ChatMessage::typing_indicator("...", Utc::now());
        assert!(msg.is_typing_indicator());
        assert_eq!(msg.sender, Sender::Assistant);
        assert_eq!(msg.content, "...");
        assert_eq!(msg.id.as_str(), TYPING_INDICATOR_ID);
    }

    #[test]
    fn test_generated_message_ids_differ() {
        assert_ne!(MessageId::generate(), MessageId::generate());
        assert!(!ChatMessage {
            id: MessageId::generate(),
            content: "x".into(),
            sender: Sender::User,
            timestamp: Utc::now(),
        }
        .is_typing_indicator());
    }

    #[test]
    fn test_thread_id_display_and_conversions() {
        let id = ThreadId::from("abc");
        assert_eq!(id.to_string(), "abc");
        assert_eq!(ThreadId::from("abc".to_string()), id);
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }

    #[test]
    fn test_chat_thread_camel_case() {
        let thread = ChatThread {
            id: ThreadId::new("t1"),
            title: "Robins".into(),
            created_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            user_id: None,
        };
        let json = serde_json::to_value(&thread).unwrap();
        assert!(json.get("createdAt").is_some());
        assert!(json.get("userId").is_none());
    }

    #[test]
    fn test_metadata_fallback() {
        let meta = BirdMetadata::fallback();
        assert!(meta.is_fallback());
        let meta = BirdMetadata {
            image_url: Some("https://img".into()),
            reference_url: None,
        };
        assert!(!meta.is_fallback());
    }
}
