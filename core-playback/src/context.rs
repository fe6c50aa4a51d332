//! Shared inputs for creating loop rotators.

use crate::config::LoopConfig;
use bridge_traits::media::MediaPlayerBackend;
use core_runtime::events::EventBus;
use std::fmt;
use std::sync::Arc;

/// Everything a [`LoopRotator`](crate::LoopRotator) needs besides its
/// resource: the platform backend, tuning, and an optional bus to publish
/// loop events on. Cheap to clone.
#[derive(Clone)]
pub struct PlaybackContext {
    backend: Arc<dyn MediaPlayerBackend>,
    config: LoopConfig,
    event_bus: Option<EventBus>,
}

impl PlaybackContext {
    pub fn new(backend: Arc<dyn MediaPlayerBackend>) -> Self {
        Self {
            backend,
            config: LoopConfig::default(),
            event_bus: None,
        }
    }

    pub fn with_config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn backend(&self) -> &Arc<dyn MediaPlayerBackend> {
        &self.backend
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn event_bus(&self) -> Option<&EventBus> {
        self.event_bus.as_ref()
    }
}

impl fmt::Debug for PlaybackContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackContext")
            .field("config", &self.config)
            .field("has_event_bus", &self.event_bus.is_some())
            .finish()
    }
}
