//! Chat components for Aviary.
//!
//! Session Store, Thread Directory, Message Dispatcher and Suggestion
//! Fetcher, composed by the `ChatSession` façade.

pub mod directory;
pub mod dispatcher;
pub mod error;
pub mod session;
pub mod state_machine;
pub mod store;
pub mod suggestions;

#[cfg(test)]
pub(crate) mod testing;

pub use directory::{group_by_recency, RecencyBucket, ThreadDirectory, ThreadGroup};
pub use dispatcher::{DispatchOutcome, MessageDispatcher};
pub use error::ChatError;
pub use session::ChatSession;
pub use state_machine::{validate_transition, DispatchState};
pub use store::SessionStore;
pub use suggestions::{SuggestionFetcher, SuggestionState};
