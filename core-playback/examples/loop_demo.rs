//! # Gapless Loop Demo
//!
//! Drives a loop rotator against the virtual media backend and prints the
//! rotation events it publishes.
//!
//! Run with:
//! ```bash
//! cargo run --example loop_demo --package core-playback
//!
//! # JSON logs
//! cargo run --example loop_demo --package core-playback -- json
//! ```

use bridge_traits::logging::LogLevel;
use bridge_traits::media::ResourceId;
use bridge_virtual::{ResourceCatalog, VirtualMediaBackend};
use core_playback::{LoopConfig, LoopRotator, PlaybackContext, PlaybackError};
use core_runtime::events::{CoreEvent, EventBus};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use std::env;
use std::sync::Arc;

const LOOPS: usize = 4;

#[tokio::main]
async fn main() -> Result<(), PlaybackError> {
    let format = match env::args().nth(1).as_deref() {
        Some("json") => LogFormat::Json,
        Some("pretty") => LogFormat::Pretty,
        _ => LogFormat::Compact,
    };
    if let Err(err) = init_logging(
        LoggingConfig::default()
            .with_format(format)
            .with_level(LogLevel::Debug),
    ) {
        eprintln!("logging disabled: {}", err);
    }

    let catalog = Arc::new(ResourceCatalog::new().with_resource("rain", 1));
    let backend = Arc::new(VirtualMediaBackend::new(catalog));
    let bus = EventBus::new(64);
    let mut events = bus.subscribe();

    let ctx = PlaybackContext::new(backend.clone())
        .with_config(LoopConfig::default().with_initial_volume(0.8))
        .with_event_bus(bus);
    let rotator = LoopRotator::create(&ctx, ResourceId::new(1)).await?;

    for _ in 0..LOOPS {
        let snapshot = rotator.snapshot().await?;
        println!(
            "loop #{} on {} (standby {:?}, linked: {})",
            snapshot.loop_count, snapshot.current, snapshot.standby, snapshot.standby_linked
        );
        if backend.complete(snapshot.current).is_err() {
            break;
        }
    }

    rotator.set_volume(0.25, 0.25).await?;
    println!("playing: {}", rotator.is_playing().await?);
    rotator.release().await?;

    while let Ok(event) = events.try_recv() {
        if matches!(event, CoreEvent::Loop(_)) {
            let json = serde_json::to_string(&event).unwrap_or_default();
            println!("{:<28} {}", event.description(), json);
        }
    }

    Ok(())
}
