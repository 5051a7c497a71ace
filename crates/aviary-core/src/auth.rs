//! Authentication collaborator.
//!
//! The identity provider itself lives outside Aviary; components only need
//! the current user id (if any) to scope the threads they create.

/// Source of the signed-in user's identifier.
pub trait AuthProvider: Send + Sync {
    /// The stable id of the signed-in user, or `None` when signed out.
    fn current_user(&self) -> Option<String>;
}

/// Fixed identity, for headless use and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticAuth {
    user_id: Option<String>,
}

impl StaticAuth {
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self { user_id: None }
    }
}

impl AuthProvider for StaticAuth {
    fn current_user(&self) -> Option<String> {
        self.user_id.clone()
    }
}
