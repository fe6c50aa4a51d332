//! # Core Configuration Module
//!
//! Builder for the dependencies and settings shared by the gapless loop core.
//!
//! ## Overview
//!
//! [`CoreConfig::builder`] collects the host-provided bridges and enforces
//! fail-fast validation: building without a required capability returns
//! [`Error::CapabilityMissing`] with an actionable message instead of failing
//! later at first use.
//!
//! ## Required Dependencies
//!
//! - `MediaPlayerBackend` - Platform media framework
//! - `ResourceResolver` - Lookup of bundled sound resources
//!
//! ## Optional Dependencies
//!
//! - `LoggerSink` - Mirror logs into the host logging pipeline
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .media_backend(Arc::new(MyMediaBackend::new()))
//!     .resource_resolver(Arc::new(MyResolver::new()))
//!     .event_buffer_size(64)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::logging::LoggerSink;
use bridge_traits::media::{MediaPlayerBackend, ResourceResolver};
use std::fmt;
use std::sync::Arc;

/// Validated core configuration.
#[derive(Clone)]
pub struct CoreConfig {
    pub media_backend: Arc<dyn MediaPlayerBackend>,
    pub resource_resolver: Arc<dyn ResourceResolver>,
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    /// Events buffered per bus subscriber before it starts lagging.
    pub event_buffer_size: usize,
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "event_buffer_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreConfig")
            .field("media_backend", &"<dyn MediaPlayerBackend>")
            .field("resource_resolver", &"<dyn ResourceResolver>")
            .field("has_logger_sink", &self.logger_sink.is_some())
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

fn capability_missing(capability: &str, message: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: message.to_string(),
    }
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    media_backend: Option<Arc<dyn MediaPlayerBackend>>,
    resource_resolver: Option<Arc<dyn ResourceResolver>>,
    logger_sink: Option<Arc<dyn LoggerSink>>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    pub fn media_backend(mut self, backend: Arc<dyn MediaPlayerBackend>) -> Self {
        self.media_backend = Some(backend);
        self
    }

    pub fn resource_resolver(mut self, resolver: Arc<dyn ResourceResolver>) -> Self {
        self.resource_resolver = Some(resolver);
        self
    }

    pub fn logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Build the configuration, failing fast on missing capabilities.
    pub fn build(self) -> Result<CoreConfig> {
        let media_backend = self.media_backend.ok_or_else(|| {
            capability_missing(
                "MediaPlayerBackend",
                "No media backend provided. Mobile: inject the platform-native adapter. \
                 Tests and desktop demos: use bridge_virtual::VirtualMediaBackend.",
            )
        })?;

        let resource_resolver = self.resource_resolver.ok_or_else(|| {
            capability_missing(
                "ResourceResolver",
                "No resource resolver provided. Register bundled sounds with the host \
                 resolver or use bridge_virtual::ResourceCatalog.",
            )
        })?;

        let config = CoreConfig {
            media_backend,
            resource_resolver,
            logger_sink: self.logger_sink,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}
