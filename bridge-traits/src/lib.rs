//! # Host Bridge Traits
//!
//! Platform abstraction traits that each host platform implements.
//!
//! ## Overview
//!
//! This crate defines the contract between the gapless loop core and the
//! platform media framework it drives. The core never touches native audio
//! APIs; it only calls the traits below.
//!
//! ## Traits
//!
//! - [`MediaPlayerBackend`](media::MediaPlayerBackend) - Create, control and
//!   chain playback handles
//! - [`MediaEventListener`](media::MediaEventListener) - Receive "prepared",
//!   "completed" and error callbacks from platform threads
//! - [`ResourceResolver`](media::ResourceResolver) - Map sound names to
//!   embedded resources
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Virtual (tests, desktop demos) | `bridge-virtual` | ✅ Available |
//! | Android  | TBD (`MediaPlayer.setNextMediaPlayer`) | 📋 Planned |
//! | iOS      | TBD (`AVQueuePlayer`) | 📋 Planned |
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). A call the
//! handle's state does not permit must fail with
//! [`BridgeError::InvalidState`](error::BridgeError::InvalidState) rather than
//! being silently ignored; the core passes it through to the host unchanged.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`. Listeners in particular are called
//! from platform playback threads.
//!
//! ## Example
//!
//! ```ignore
//! use bridge_traits::media::{MediaEventListener, MediaEvent};
//!
//! struct PrintListener;
//!
//! impl MediaEventListener for PrintListener {
//!     fn on_event(&self, event: MediaEvent) {
//!         println!("{:?}", event);
//!     }
//! }
//! ```

pub mod error;
pub mod logging;
pub mod media;
pub mod platform;

pub use error::BridgeError;

// Re-export commonly used types
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use media::{
    MediaEvent, MediaEventListener, MediaPlayerBackend, PlayerId, PlayerState, ResourceId,
    ResourceResolver, Volume,
};
