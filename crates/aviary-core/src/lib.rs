pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use auth::{AuthProvider, StaticAuth};
pub use config::AviaryConfig;
pub use error::{AviaryError, Result};
pub use events::{EventBus, SessionEvent};
pub use types::*;
