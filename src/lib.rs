//! Workspace placeholder crate.
//!
//! This crate exposes feature flags that map to the individual workspace
//! crates (`core-service`, `core-playback`). Host applications can depend on
//! `gapless-workspace` and enable the documented features without wiring each
//! crate individually.

#[cfg(feature = "virtual-backend")]
pub use core_playback::{LoopConfig, LoopRotator, PlaybackContext, RotatorSnapshot};
#[cfg(feature = "virtual-backend")]
pub use core_service::{bootstrap, bootstrap_virtual, SoundKey, SoundService};
