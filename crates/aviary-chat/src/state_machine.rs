//! Per-thread dispatch state machine with validated transitions.
//!
//! Idle -> Sending -> AwaitingResponse -> Resolved/Failed
//! Resolved/Failed -> Sending

use serde::Serialize;

use crate::error::ChatError;

/// Where a thread is in the send/reply cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    Idle,
    Sending,
    AwaitingResponse,
    Resolved,
    Failed,
}

impl DispatchState {
    /// A send is underway and a placeholder may be showing.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, DispatchState::Sending | DispatchState::AwaitingResponse)
    }
}

/// Validate that a dispatch transition is allowed.
pub fn validate_transition(from: DispatchState, to: DispatchState) -> Result<(), ChatError> {
    let valid = matches!(
        (from, to),
        (DispatchState::Idle, DispatchState::Sending)
            | (DispatchState::Sending, DispatchState::AwaitingResponse)
            | (DispatchState::AwaitingResponse, DispatchState::Resolved)
            | (DispatchState::AwaitingResponse, DispatchState::Failed)
            | (DispatchState::Resolved, DispatchState::Sending)
            | (DispatchState::Failed, DispatchState::Sending)
    );

    if valid {
        Ok(())
    } else {
        Err(ChatError::InvalidTransition(from, to))
    }
}
