//! Keyed pool of looping sounds.

use crate::error::{CoreError, Result};
use crate::SoundKey;
use bridge_traits::media::{ResourceId, ResourceResolver, Volume};
use core_playback::{
    LoopConfig, LoopRotator, PlaybackContext, PlaybackError, Result as PlaybackResult,
    RotatorSnapshot,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, Receiver, SoundEvent};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

struct SoundEntry {
    resource: ResourceId,
    volume: Volume,
    rotator: Option<LoopRotator>,
}

struct Inner {
    playback: PlaybackContext,
    resolver: Arc<dyn ResourceResolver>,
    event_bus: EventBus,
    sounds: Mutex<HashMap<SoundKey, SoundEntry>>,
    next_key: AtomicI32,
}

/// Host-facing façade: sounds are prepared by name, then driven by key.
///
/// A sound owns at most one [`LoopRotator`], created on the first `play`.
#[derive(Clone)]
pub struct SoundService {
    inner: Arc<Inner>,
}

impl SoundService {
    pub fn new(config: &CoreConfig, loop_config: LoopConfig) -> Result<Self> {
        config.validate()?;
        loop_config.validate()?;

        let event_bus = EventBus::new(config.event_buffer_size);
        let playback = PlaybackContext::new(Arc::clone(&config.media_backend))
            .with_config(loop_config)
            .with_event_bus(event_bus.clone());

        Ok(Self {
            inner: Arc::new(Inner {
                playback,
                resolver: Arc::clone(&config.resource_resolver),
                event_bus,
                sounds: Mutex::new(HashMap::new()),
                next_key: AtomicI32::new(0),
            }),
        })
    }

    /// Subscribe to loop and sound events.
    pub fn subscribe_events(&self) -> Receiver<CoreEvent> {
        self.inner.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.event_bus
    }

    /// Resolve `name` and register it under the next free key.
    pub async fn prepare(&self, name: &str) -> Result<SoundKey> {
        let key = {
            let sounds = self.inner.sounds.lock().await;
            self.allocate_key(&sounds)?
        };
        self.prepare_with_key(name, key).await?;
        Ok(key)
    }

    /// Next key above every key handed out or chosen by the host so far.
    fn allocate_key(&self, sounds: &HashMap<SoundKey, SoundEntry>) -> Result<SoundKey> {
        loop {
            let key = self
                .inner
                .next_key
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |key| key.checked_add(1))
                .map_err(|_| CoreError::KeySpaceExhausted)?;
            if !sounds.contains_key(&key) {
                return Ok(key);
            }
        }
    }

    /// Resolve `name` and register it under `key`, replacing (and releasing)
    /// whatever that key held before.
    pub async fn prepare_with_key(&self, name: &str, key: SoundKey) -> Result<()> {
        let normalized = normalize_name(name);
        let resource = self
            .inner
            .resolver
            .resolve(&normalized)
            .ok_or_else(|| CoreError::ResourceNotFound(name.to_string()))?;

        self.inner
            .next_key
            .fetch_max(key.saturating_add(1), Ordering::SeqCst);

        let entry = SoundEntry {
            resource,
            volume: self.inner.playback.config().initial_volume(),
            rotator: None,
        };
        let previous = self.inner.sounds.lock().await.insert(key, entry);
        if let Some(rotator) = previous.and_then(|entry| entry.rotator) {
            if let Err(err) = rotator.release().await {
                warn!(key, error = %err, "Failed to release replaced sound");
            }
        }

        info!(key, name = %normalized, %resource, "Prepared sound");
        self.publish(SoundEvent::Prepared {
            key,
            name: normalized,
            resource,
        });
        Ok(())
    }

    /// Start looping the sound. Already playing is a no-op.
    pub async fn play(&self, key: SoundKey) -> Result<()> {
        let mut sounds = self.inner.sounds.lock().await;
        let entry = sounds
            .get_mut(&key)
            .ok_or(CoreError::SoundNotPrepared(key))?;

        if let Some(rotator) = entry.rotator.as_ref() {
            match resume(rotator).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_invalid_state() => {
                    debug!(key, error = %err, "Loop cannot resume; recreating it");
                    if let Some(stale) = entry.rotator.take() {
                        if let Err(err) = stale.release().await {
                            debug!(key, error = %err, "Stale loop was already released");
                        }
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }

        let rotator =
            LoopRotator::create_with_volume(&self.inner.playback, entry.resource, entry.volume)
                .await?;
        debug!(key, resource = %entry.resource, "Started loop");
        entry.rotator = Some(rotator);
        Ok(())
    }

    pub async fn pause(&self, key: SoundKey) -> Result<()> {
        match self.rotator(key).await {
            Some(rotator) => Ok(rotator.pause().await?),
            None => Ok(()),
        }
    }

    pub async fn stop(&self, key: SoundKey) -> Result<()> {
        match self.rotator(key).await {
            Some(rotator) => Ok(rotator.stop().await?),
            None => Ok(()),
        }
    }

    /// Store the sound's volume and forward it to a running loop.
    pub async fn set_volume(&self, key: SoundKey, left: f32, right: f32) -> Result<()> {
        let volume = Volume::new(left, right);
        if !volume.is_valid() {
            return Err(PlaybackError::InvalidVolume { left, right }.into());
        }

        let mut sounds = self.inner.sounds.lock().await;
        let Some(entry) = sounds.get_mut(&key) else {
            return Ok(());
        };
        entry.volume = volume;
        if let Some(rotator) = entry.rotator.as_ref() {
            rotator.set_volume(left, right).await?;
        }
        Ok(())
    }

    /// Forget the sound and release its loop.
    pub async fn release(&self, key: SoundKey) -> Result<()> {
        let Some(entry) = self.inner.sounds.lock().await.remove(&key) else {
            return Ok(());
        };

        info!(key, "Released sound");
        self.publish(SoundEvent::Released { key });
        if let Some(rotator) = entry.rotator {
            rotator.release().await?;
        }
        Ok(())
    }

    pub async fn is_loaded(&self, key: SoundKey) -> bool {
        self.inner.sounds.lock().await.contains_key(&key)
    }

    pub async fn is_playing(&self, key: SoundKey) -> Result<bool> {
        match self.rotator(key).await {
            Some(rotator) => Ok(rotator.is_playing().await?),
            None => Ok(false),
        }
    }

    /// Loop diagnostics; `None` until the sound is first played.
    pub async fn snapshot(&self, key: SoundKey) -> Result<Option<RotatorSnapshot>> {
        let rotator = {
            let sounds = self.inner.sounds.lock().await;
            let entry = sounds.get(&key).ok_or(CoreError::SoundNotPrepared(key))?;
            entry.rotator.clone()
        };
        match rotator {
            Some(rotator) => Ok(Some(rotator.snapshot().await?)),
            None => Ok(None),
        }
    }

    /// Release every sound. All loops are attempted; the first error is
    /// returned.
    pub async fn shutdown(&self) -> Result<()> {
        let drained: Vec<(SoundKey, SoundEntry)> =
            self.inner.sounds.lock().await.drain().collect();
        info!(sounds = drained.len(), "Shutting down sound service");

        let mut first_error = None;
        for (key, entry) in drained {
            self.publish(SoundEvent::Released { key });
            let Some(rotator) = entry.rotator else {
                continue;
            };
            if let Err(err) = rotator.release().await {
                warn!(key, error = %err, "Failed to release sound during shutdown");
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    async fn rotator(&self, key: SoundKey) -> Option<LoopRotator> {
        self.inner
            .sounds
            .lock()
            .await
            .get(&key)
            .and_then(|entry| entry.rotator.clone())
    }

    fn publish(&self, event: SoundEvent) {
        let _ = self.inner.event_bus.emit(CoreEvent::Sound(event));
    }
}

async fn resume(rotator: &LoopRotator) -> PlaybackResult<()> {
    if rotator.is_playing().await? {
        return Ok(());
    }
    rotator.start().await
}

/// Relative names are looked up the way bundled resources are named:
/// lower-cased, without extension. Absolute paths and URLs pass through.
pub(crate) fn normalize_name(name: &str) -> String {
    let is_relative = !(name.starts_with('/') || name.starts_with("http"));
    if !is_relative {
        return name.to_string();
    }

    let lowered = name.to_lowercase();
    match lowered.rfind('.') {
        Some(dot) if !lowered[dot + 1..].is_empty() => lowered[..dot].to_string(),
        _ => lowered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_virtual::{ResourceCatalog, VirtualMediaBackend};
    use mockall::mock;
    use mockall::predicate::eq;

    mock! {
        Resolver {}

        impl ResourceResolver for Resolver {
            fn resolve(&self, name: &str) -> Option<ResourceId>;
        }
    }

    fn service_with(resolver: MockResolver) -> SoundService {
        let backend = Arc::new(VirtualMediaBackend::new(Arc::new(ResourceCatalog::new())));
        let config = CoreConfig::builder()
            .media_backend(backend)
            .resource_resolver(Arc::new(resolver))
            .build()
            .unwrap();
        SoundService::new(&config, LoopConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn resolver_sees_normalized_name() {
        let mut resolver = MockResolver::new();
        resolver
            .expect_resolve()
            .with(eq("rain"))
            .times(1)
            .returning(|_| Some(ResourceId(4)));

        let service = service_with(resolver);
        assert_eq!(service.prepare("Rain.MP3").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unresolved_name_keeps_original_spelling_in_error() {
        let mut resolver = MockResolver::new();
        resolver.expect_resolve().returning(|_| None);

        let service = service_with(resolver);
        let err = service.prepare("Thunder.wav").await.unwrap_err();
        assert!(matches!(err, CoreError::ResourceNotFound(name) if name == "Thunder.wav"));
        assert!(!service.is_loaded(0).await);
    }

    #[test]
    fn relative_names_are_lowercased_without_extension() {
        assert_eq!(normalize_name("Rain.MP3"), "rain");
        assert_eq!(normalize_name("ocean_waves.ogg"), "ocean_waves");
        assert_eq!(normalize_name("forest"), "forest");
        assert_eq!(normalize_name("white.noise.wav"), "white.noise");
    }

    #[test]
    fn absolute_paths_and_urls_pass_through() {
        assert_eq!(normalize_name("/sdcard/Rain.mp3"), "/sdcard/Rain.mp3");
        assert_eq!(
            normalize_name("https://cdn.example/Rain.mp3"),
            "https://cdn.example/Rain.mp3"
        );
    }

    #[test]
    fn trailing_dot_is_kept() {
        assert_eq!(normalize_name("Rain."), "rain.");
    }
}
