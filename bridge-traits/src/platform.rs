//! Thread-safety bounds shared by every bridge trait.
//!
//! Media callbacks arrive on platform playback threads, so backends and
//! listeners must be shareable across threads. Keeping the bound behind a
//! marker trait lets a single-threaded target relax it in one place.

/// Marker trait equivalent to `Send + Sync`.
pub trait PlatformSendSync: Send + Sync {}

impl<T> PlatformSendSync for T where T: Send + Sync + ?Sized {}
