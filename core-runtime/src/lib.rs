//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the gapless loop core:
//! - Logging and tracing infrastructure
//! - Configuration management with fail-fast capability checks
//! - Event bus for loop and sound lifecycle notifications
//!
//! ## Overview
//!
//! The playback and service crates depend on this crate for their logging
//! conventions, their shared configuration and the broadcast channel hosts
//! subscribe to.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
