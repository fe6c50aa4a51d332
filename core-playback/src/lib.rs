//! # Gapless Loop Playback
//!
//! Loops one embedded audio resource without an audible gap.
//!
//! ## Overview
//!
//! A naive loop stops the finished handle and restarts it, which leaves a
//! short silence while the platform re-arms the player. The [`LoopRotator`]
//! instead keeps two handles: `current` plays while `standby` is prepared and
//! registered as its platform-level successor. When `current` completes the
//! platform starts `standby` immediately, the rotator releases the finished
//! handle, promotes `standby` and arms a fresh one.
//!
//! All slot state lives in a single actor task per rotator; platform
//! callbacks and host commands both reach it as messages.

pub mod config;
pub mod context;
pub mod error;
pub mod rotator;

pub use config::LoopConfig;
pub use context::PlaybackContext;
pub use error::{PlaybackError, Result};
pub use rotator::{LoopRotator, RotatorSnapshot};
