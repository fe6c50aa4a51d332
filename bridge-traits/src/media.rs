//! Media bridge traits and supporting handle types.
//!
//! These abstractions let the loop rotator drive a platform media framework
//! (Android `MediaPlayer`, AVFoundation, a desktop engine) through the one
//! primitive gapless looping needs: designating a prepared successor handle
//! that the platform starts the instant the current handle finishes.
//!
//! Handles are addressed by [`PlayerId`]. Asynchronous platform signals
//! ("prepared", "completed", errors) are delivered to the
//! [`MediaEventListener`] supplied when the handle is created.

use crate::{error::Result, platform::PlatformSendSync};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Identifier of a fixed audio resource embedded in the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub u32);

impl ResourceId {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "res#{}", self.0)
    }
}

/// Unique identifier for one playback handle issued by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(Uuid);

impl PlayerId {
    /// Generate a new handle identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Construct an identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Borrow the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a single playback handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerState {
    /// Freshly reset; needs to be prepared again before it can play.
    Uninitialized,
    Preparing,
    Prepared,
    Playing,
    Paused,
    Stopped,
    /// Natural end of the resource was reached.
    Completed,
    /// Terminal. Every further call on the handle fails.
    Released,
}

impl PlayerState {
    pub fn is_released(&self) -> bool {
        matches!(self, PlayerState::Released)
    }
}

/// Left/right playback gain, each channel normalized to `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    pub left: f32,
    pub right: f32,
}

impl Volume {
    pub const MUTED: Volume = Volume {
        left: 0.0,
        right: 0.0,
    };

    pub const UNITY: Volume = Volume {
        left: 1.0,
        right: 1.0,
    };

    pub fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    /// Same gain on both channels.
    pub fn uniform(gain: f32) -> Self {
        Self::new(gain, gain)
    }

    /// Returns `true` if both channels are finite and within `0.0..=1.0`.
    pub fn is_valid(&self) -> bool {
        let in_range = |v: f32| v.is_finite() && (0.0..=1.0).contains(&v);
        in_range(self.left) && in_range(self.right)
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::UNITY
    }
}

/// Asynchronous signal raised by the platform for one handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEvent {
    /// The handle finished preparing and may be started.
    Prepared(PlayerId),
    /// The handle played its resource to the end.
    Completed(PlayerId),
    /// The platform reported an asynchronous playback error.
    Error { player: PlayerId, message: String },
}

impl MediaEvent {
    /// Handle the event refers to.
    pub fn player(&self) -> PlayerId {
        match self {
            MediaEvent::Prepared(id) | MediaEvent::Completed(id) => *id,
            MediaEvent::Error { player, .. } => *player,
        }
    }
}

/// Receiver for platform media callbacks.
///
/// Backends may invoke `on_event` from any thread, including from inside a
/// backend call. Implementations must return quickly and must not call back
/// into the backend.
pub trait MediaEventListener: PlatformSendSync {
    fn on_event(&self, event: MediaEvent);
}

/// Trait for platform media frameworks capable of gapless successor chaining.
///
/// Every control call that the current handle state does not permit fails
/// with [`BridgeError::InvalidState`](crate::BridgeError::InvalidState).
#[async_trait::async_trait]
pub trait MediaPlayerBackend: PlatformSendSync {
    /// Create a handle bound to `resource` and begin preparing it. The
    /// `Prepared` signal is delivered to `listener`, possibly before this call
    /// returns.
    async fn create(
        &self,
        resource: ResourceId,
        listener: Arc<dyn MediaEventListener>,
    ) -> Result<PlayerId>;

    /// Set the playback gain of a handle.
    async fn set_volume(&self, player: PlayerId, volume: Volume) -> Result<()>;

    /// Report the gain currently applied to a handle.
    async fn volume(&self, player: PlayerId) -> Result<Volume>;

    /// Designate `next` to start the instant `player` completes. `next` must
    /// already be prepared.
    async fn set_next(&self, player: PlayerId, next: PlayerId) -> Result<()>;

    /// Begin or resume playback.
    async fn start(&self, player: PlayerId) -> Result<()>;

    /// Stop playback. The handle must be prepared again before restarting.
    async fn stop(&self, player: PlayerId) -> Result<()>;

    /// Pause playback without releasing the handle.
    async fn pause(&self, player: PlayerId) -> Result<()>;

    /// Return the handle to its uninitialized state.
    async fn reset(&self, player: PlayerId) -> Result<()>;

    /// Free the native resources behind a handle. Terminal.
    async fn release(&self, player: PlayerId) -> Result<()>;

    /// Whether the handle is currently playing.
    async fn is_playing(&self, player: PlayerId) -> Result<bool>;

    /// Fetch the backend's current understanding of the handle state.
    async fn state(&self, player: PlayerId) -> Result<PlayerState>;
}

/// Maps a sound name to an embedded audio resource.
pub trait ResourceResolver: PlatformSendSync {
    /// Returns `None` when no resource with that name is bundled.
    fn resolve(&self, name: &str) -> Option<ResourceId>;
}
