use thiserror::Error;

use crate::media::{PlayerId, PlayerState};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    /// The handle is not in a state that permits the requested call.
    #[error("Invalid state for {operation}: player is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: PlayerState,
    },

    #[error("Audio resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Unknown player handle: {0}")]
    UnknownPlayer(PlayerId),
}

impl BridgeError {
    pub fn invalid_state(operation: &'static str, state: PlayerState) -> Self {
        Self::InvalidState { operation, state }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
