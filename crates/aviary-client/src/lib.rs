//! Aviary Client crate - HTTP access to the Aviary service.
//!
//! `BirdApi` is the seam the chat and history components depend on;
//! `HttpBirdApi` implements it over reqwest. The `wire` module holds the
//! JSON bodies shared with the server.

pub mod api;
pub mod error;
pub mod http;
pub mod wire;

pub use api::{AssistantReply, BirdApi};
pub use error::ClientError;
pub use http::HttpBirdApi;
