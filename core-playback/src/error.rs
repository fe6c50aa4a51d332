//! # Playback Error Types

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors that can occur during loop playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// The platform rejected the call, most often because the handle's state
    /// does not permit it. Passed through unchanged.
    #[error("Media backend error: {0}")]
    Bridge(#[from] BridgeError),

    /// The rotator itself can no longer serve the call.
    #[error("Invalid state for {operation}: {reason}")]
    InvalidState {
        operation: &'static str,
        reason: String,
    },

    /// Invalid volume value (each channel must be in range [0.0, 1.0]).
    #[error("Invalid volume: left={left}, right={right} (must be between 0.0 and 1.0)")]
    InvalidVolume { left: f32, right: f32 },

    #[error("Invalid loop configuration: {0}")]
    InvalidConfig(String),
}

impl PlaybackError {
    pub(crate) fn released(operation: &'static str) -> Self {
        PlaybackError::InvalidState {
            operation,
            reason: "rotator has been released".to_string(),
        }
    }

    /// Returns `true` for the "operation not valid in the current state"
    /// category, whether raised by the platform or by the rotator.
    pub fn is_invalid_state(&self) -> bool {
        matches!(
            self,
            PlaybackError::InvalidState { .. }
                | PlaybackError::Bridge(BridgeError::InvalidState { .. })
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
