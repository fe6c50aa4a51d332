//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (the platform media
//! framework and the bundled-resource resolver) into a [`SoundService`]: a
//! keyed pool of gapless loops, one per prepared sound. Native hosts call
//! [`bootstrap`] with their own adapters; desktop demos and tests enable the
//! `virtual-backend` feature and use [`bootstrap_virtual`].

pub mod error;
mod service;

pub use error::{CoreError, Result};
pub use service::SoundService;

use core_playback::LoopConfig;
use core_runtime::config::CoreConfig;
use tracing::info;

#[cfg(feature = "virtual-backend")]
use bridge_virtual::{ResourceCatalog, VirtualMediaBackend};
#[cfg(feature = "virtual-backend")]
use std::sync::Arc;

/// Host-chosen handle for a prepared sound.
pub type SoundKey = i32;

/// Build a sound service from validated host dependencies.
pub fn bootstrap(config: CoreConfig, loop_config: LoopConfig) -> Result<SoundService> {
    let service = SoundService::new(&config, loop_config)
        .map_err(|err| CoreError::InitializationFailed(err.to_string()))?;
    info!(
        event_buffer_size = config.event_buffer_size,
        "Sound service ready"
    );
    Ok(service)
}

/// Convenience bootstrapper backed by the in-process virtual media backend.
///
/// The backend is returned alongside the service so callers can drive its
/// prepared and completed signals.
///
/// ```
/// # #[cfg(feature = "virtual-backend")]
/// # fn example() -> core_service::Result<()> {
/// use bridge_virtual::ResourceCatalog;
/// use core_playback::LoopConfig;
/// use core_service::bootstrap_virtual;
/// use std::sync::Arc;
///
/// let catalog = Arc::new(ResourceCatalog::new().with_resource("rain", 1));
/// let (service, backend) = bootstrap_virtual(catalog, LoopConfig::default())?;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "virtual-backend")]
pub fn bootstrap_virtual(
    catalog: Arc<ResourceCatalog>,
    loop_config: LoopConfig,
) -> Result<(SoundService, Arc<VirtualMediaBackend>)> {
    let backend = Arc::new(VirtualMediaBackend::new(Arc::clone(&catalog)));
    let config = CoreConfig::builder()
        .media_backend(backend.clone())
        .resource_resolver(catalog)
        .build()?;
    Ok((bootstrap(config, loop_config)?, backend))
}
