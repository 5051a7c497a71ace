//! Aviary API crate - axum HTTP service for chats, sightings and metadata.
//!
//! Serves the chat endpoints backed by the document store, proxies user
//! messages to a completion provider, ingests sightings from the detection
//! process and resolves species reference pages.

pub mod error;
pub mod handlers;
pub mod llm;
pub mod metadata;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use llm::{CannedProvider, CompletionProvider, LlmError, OpenAiProvider};
pub use routes::{create_router, start_server};
pub use state::AppState;
