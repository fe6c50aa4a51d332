use crate::SoundKey;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Sound resource not found: {0}")]
    ResourceNotFound(String),

    #[error("No free sound keys left")]
    KeySpaceExhausted,

    #[error("No sound prepared for key {0}")]
    SoundNotPrepared(SoundKey),

    #[error("Playback error: {0}")]
    Playback(#[from] core_playback::PlaybackError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
