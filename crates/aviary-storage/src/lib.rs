//! Aviary Storage crate - SQLite-backed document store with live queries.
//!
//! Provides a WAL-mode SQLite database with migrations, a collection/document
//! store with filtered and ordered queries, push-style subscriptions, and
//! typed repositories for chat threads, messages and bird sightings.

pub mod db;
pub mod document;
pub mod live;
pub mod migrations;
pub mod repository;
pub mod store;

pub use db::Database;
pub use document::{Direction, Document, Fields, OrderBy, Predicate, Query};
pub use live::LiveQuery;
pub use repository::{
    messages_path, ChatRepository, SightingFilter, SightingRepository, BIRDS, CHATS,
};
pub use store::{DocumentStore, SqliteDocumentStore};
