//! # Loop Rotator
//!
//! Two-slot handle rotation for gapless looping.
//!
//! ## Slots
//!
//! - `current` plays the resource.
//! - `standby` is prepared in the background, receives the shared volume on
//!   its prepared signal and is then linked as `current`'s platform successor.
//!
//! When `current` completes, the platform has already started `standby`. The
//! rotator releases the finished handle, promotes `standby` and arms a new
//! one. The loop counter starts at 1 and grows by one per rotation.
//!
//! ## Threading Model
//!
//! Each rotator is one tokio task owning both slots. [`LoopRotator`] is a
//! cheap, cloneable handle that sends commands to it; platform callbacks are
//! forwarded into the same task through an unbounded channel. Platform
//! signals are drained before commands, so a command always observes every
//! signal delivered before it was sent.
//!
//! ## Usage
//!
//! ```ignore
//! use core_playback::{LoopRotator, PlaybackContext};
//!
//! let ctx = PlaybackContext::new(backend);
//! let rotator = LoopRotator::create(&ctx, resource).await?;
//! rotator.set_volume(0.5, 0.5).await?;
//! // ...
//! rotator.release().await?;
//! ```

use crate::context::PlaybackContext;
use crate::error::{PlaybackError, Result};
use bridge_traits::error::BridgeError;
use bridge_traits::media::{
    MediaEvent, MediaEventListener, MediaPlayerBackend, PlayerId, ResourceId, Volume,
};
use core_runtime::events::{CoreEvent, EventBus, LoopEvent};
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

/// Loop counter value before the first rotation.
const FIRST_LOOP: u64 = 1;

/// Point-in-time view of a rotator's slots, for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct RotatorSnapshot {
    pub resource: ResourceId,
    pub current: PlayerId,
    pub standby: Option<PlayerId>,
    /// Whether `standby` is registered as `current`'s successor.
    pub standby_linked: bool,
    pub volume: Volume,
    pub loop_count: u64,
}

type Reply<T> = oneshot::Sender<Result<T>>;

enum Command {
    IsPlaying(Reply<bool>),
    SetVolume(Volume, Reply<()>),
    Start(Reply<()>),
    Stop(Reply<()>),
    Pause(Reply<()>),
    Reset(Reply<()>),
    Release(Reply<()>),
    Snapshot(Reply<RotatorSnapshot>),
}

/// Host-facing handle to a gapless loop of one resource.
///
/// Dropping every clone without calling [`release`](Self::release) stops the
/// loop's task and, when `LoopConfig::release_on_drop` is set, releases both
/// handles.
#[derive(Clone)]
pub struct LoopRotator {
    resource: ResourceId,
    commands: mpsc::Sender<Command>,
}

impl LoopRotator {
    /// Start looping `resource` at the context's initial volume.
    ///
    /// Fails if the backend cannot create the first handle. Failing to
    /// create the standby handle is not fatal.
    pub async fn create(ctx: &PlaybackContext, resource: ResourceId) -> Result<Self> {
        Self::create_with_volume(ctx, resource, ctx.config().initial_volume()).await
    }

    /// Start looping `resource` with an explicit starting volume.
    pub async fn create_with_volume(
        ctx: &PlaybackContext,
        resource: ResourceId,
        volume: Volume,
    ) -> Result<Self> {
        let config = ctx.config();
        config.validate()?;
        if !volume.is_valid() {
            return Err(PlaybackError::InvalidVolume {
                left: volume.left,
                right: volume.right,
            });
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let listener: Arc<dyn MediaEventListener> = Arc::new(ChannelListener { events: event_tx });

        let current = ctx
            .backend()
            .create(resource, Arc::clone(&listener))
            .await?;
        info!(%resource, player = %current, "Created loop rotator");

        let mut actor = RotatorActor {
            backend: Arc::clone(ctx.backend()),
            listener,
            event_bus: ctx.event_bus().cloned(),
            resource,
            current: Slot::awaiting_start(current),
            standby: None,
            standby_linked: false,
            volume,
            loop_count: FIRST_LOOP,
            standby_attempts: config.standby_create_attempts,
            release_on_drop: config.release_on_drop,
        };
        actor.arm_standby().await;

        let (commands, command_rx) = mpsc::channel(config.command_buffer);
        let span = info_span!("loop_rotator", %resource);
        tokio::spawn(actor.run(command_rx, event_rx).instrument(span));

        Ok(Self { resource, commands })
    }

    pub fn resource(&self) -> ResourceId {
        self.resource
    }

    /// Whether the `current` handle is playing.
    pub async fn is_playing(&self) -> Result<bool> {
        self.request("is_playing", Command::IsPlaying).await
    }

    /// Store the shared volume and apply it to both slots.
    pub async fn set_volume(&self, left: f32, right: f32) -> Result<()> {
        let volume = Volume::new(left, right);
        if !volume.is_valid() {
            return Err(PlaybackError::InvalidVolume { left, right });
        }
        self.request("set_volume", |reply| Command::SetVolume(volume, reply))
            .await
    }

    pub async fn start(&self) -> Result<()> {
        self.request("start", Command::Start).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.request("stop", Command::Stop).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.request("pause", Command::Pause).await
    }

    /// Reset the `current` handle only.
    pub async fn reset(&self) -> Result<()> {
        self.request("reset", Command::Reset).await
    }

    /// Release both handles. The rotator is unusable afterwards; every later
    /// call, including a second `release`, fails with an invalid-state error.
    pub async fn release(&self) -> Result<()> {
        self.request("release", Command::Release).await
    }

    pub async fn snapshot(&self) -> Result<RotatorSnapshot> {
        self.request("snapshot", Command::Snapshot).await
    }

    /// Completed rotations plus one.
    pub async fn loop_count(&self) -> Result<u64> {
        Ok(self.snapshot().await?.loop_count)
    }

    async fn request<T>(
        &self,
        operation: &'static str,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| PlaybackError::released(operation))?;
        response
            .await
            .map_err(|_| PlaybackError::released(operation))?
    }
}

impl std::fmt::Debug for LoopRotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopRotator")
            .field("resource", &self.resource)
            .field("closed", &self.commands.is_closed())
            .finish()
    }
}

/// Forwards platform callbacks into the rotator task.
struct ChannelListener {
    events: mpsc::UnboundedSender<MediaEvent>,
}

impl MediaEventListener for ChannelListener {
    fn on_event(&self, event: MediaEvent) {
        if self.events.send(event).is_err() {
            trace!("Dropped media event for a stopped rotator");
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    id: PlayerId,
    prepared: bool,
    /// Start the handle as soon as its prepared signal arrives.
    start_on_prepared: bool,
}

impl Slot {
    fn awaiting_start(id: PlayerId) -> Self {
        Self {
            id,
            prepared: false,
            start_on_prepared: true,
        }
    }

    fn standby(id: PlayerId) -> Self {
        Self {
            id,
            prepared: false,
            start_on_prepared: false,
        }
    }
}

struct RotatorActor {
    backend: Arc<dyn MediaPlayerBackend>,
    listener: Arc<dyn MediaEventListener>,
    event_bus: Option<EventBus>,
    resource: ResourceId,
    current: Slot,
    standby: Option<Slot>,
    standby_linked: bool,
    volume: Volume,
    loop_count: u64,
    standby_attempts: u32,
    release_on_drop: bool,
}

impl RotatorActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut media: mpsc::UnboundedReceiver<MediaEvent>,
    ) {
        loop {
            tokio::select! {
                biased;

                Some(event) = media.recv() => self.on_media_event(event).await,
                command = commands.recv() => {
                    let Some(command) = command else {
                        self.on_handles_dropped().await;
                        break;
                    };
                    if self.on_command(command).await.is_break() {
                        break;
                    }
                }
            }
        }

        debug!(loop_count = self.loop_count, "Rotator task stopped");
    }

    // ------------------------------------------------------------------
    // Host commands
    // ------------------------------------------------------------------

    async fn on_command(&mut self, command: Command) -> ControlFlow<()> {
        let current = self.current.id;
        match command {
            Command::IsPlaying(reply) => {
                let _ = reply.send(self.backend.is_playing(current).await.map_err(Into::into));
            }
            Command::SetVolume(volume, reply) => {
                let _ = reply.send(self.set_volume(volume).await);
            }
            Command::Start(reply) => {
                let _ = reply.send(self.backend.start(current).await.map_err(Into::into));
            }
            Command::Stop(reply) => {
                let _ = reply.send(self.backend.stop(current).await.map_err(Into::into));
            }
            Command::Pause(reply) => {
                let _ = reply.send(self.backend.pause(current).await.map_err(Into::into));
            }
            Command::Reset(reply) => {
                let result = self.backend.reset(current).await;
                if result.is_ok() {
                    // The platform forgets the successor on reset.
                    self.standby_linked = false;
                }
                let _ = reply.send(result.map_err(Into::into));
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(Ok(self.snapshot()));
            }
            Command::Release(reply) => {
                let _ = reply.send(self.release_all().await);
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    async fn set_volume(&mut self, volume: Volume) -> Result<()> {
        self.volume = volume;
        self.backend.set_volume(self.current.id, volume).await?;
        if let Some(standby) = self.standby {
            self.backend.set_volume(standby.id, volume).await?;
        }
        Ok(())
    }

    /// Release `current`, then `standby`. Both are attempted; the first
    /// failure is returned.
    async fn release_all(&mut self) -> Result<()> {
        let current = self.backend.release(self.current.id).await;
        let standby = match self.standby.take() {
            Some(slot) => self.backend.release(slot.id).await,
            None => Ok(()),
        };
        self.standby_linked = false;

        info!(loop_count = self.loop_count, "Released loop rotator");
        self.publish(LoopEvent::Released {
            resource: self.resource,
            loop_count: self.loop_count,
        });

        current?;
        standby?;
        Ok(())
    }

    async fn on_handles_dropped(&mut self) {
        if !self.release_on_drop {
            debug!("All rotator handles dropped; leaving players to the backend");
            return;
        }
        if let Err(err) = self.release_all().await {
            warn!(error = %err, "Failed to release players after all rotator handles were dropped");
        }
    }

    fn snapshot(&self) -> RotatorSnapshot {
        RotatorSnapshot {
            resource: self.resource,
            current: self.current.id,
            standby: self.standby.map(|slot| slot.id),
            standby_linked: self.standby_linked,
            volume: self.volume,
            loop_count: self.loop_count,
        }
    }

    // ------------------------------------------------------------------
    // Platform signals
    // ------------------------------------------------------------------

    async fn on_media_event(&mut self, event: MediaEvent) {
        match event {
            MediaEvent::Prepared(player) => self.on_prepared(player).await,
            MediaEvent::Completed(player) if player == self.current.id => self.rotate().await,
            MediaEvent::Completed(player) => {
                trace!(%player, "Ignoring completion outside the current slot");
            }
            MediaEvent::Error { player, message } => {
                warn!(%player, %message, "Platform reported a playback error");
                self.publish(LoopEvent::PlayerError {
                    resource: self.resource,
                    player,
                    message,
                });
            }
        }
    }

    async fn on_prepared(&mut self, player: PlayerId) {
        if player == self.current.id {
            self.current.prepared = true;
            self.apply_volume(player).await;
            if self.current.start_on_prepared {
                self.current.start_on_prepared = false;
                self.start_current().await;
            }
        } else if let Some(standby) = self.standby.as_mut().filter(|slot| slot.id == player) {
            standby.prepared = true;
            self.apply_volume(player).await;
            self.link_standby().await;
        } else {
            trace!(%player, "Ignoring prepared signal outside both slots");
        }
    }

    async fn start_current(&mut self) {
        let player = self.current.id;
        match self.backend.start(player).await {
            Ok(()) => {
                debug!(%player, "Started current player");
                self.publish(LoopEvent::Started {
                    resource: self.resource,
                    player,
                });
            }
            Err(err) => self.report_player_error(player, "start", err),
        }
    }

    /// Apply the latest shared volume, not the value at creation time.
    async fn apply_volume(&mut self, player: PlayerId) {
        if let Err(err) = self.backend.set_volume(player, self.volume).await {
            self.report_player_error(player, "set_volume", err);
        }
    }

    async fn link_standby(&mut self) {
        let Some(standby) = self.standby else {
            return;
        };
        if !standby.prepared || self.standby_linked {
            return;
        }

        match self.backend.set_next(self.current.id, standby.id).await {
            Ok(()) => {
                self.standby_linked = true;
                trace!(current = %self.current.id, next = %standby.id, "Linked standby as successor");
            }
            Err(err) => self.report_player_error(standby.id, "set_next", err),
        }
    }

    /// Completion boundary: release, promote, re-arm, count.
    async fn rotate(&mut self) {
        let finished = self.current.id;
        if let Err(err) = self.backend.release(finished).await {
            self.report_player_error(finished, "release", err);
        }

        let linked = std::mem::replace(&mut self.standby_linked, false);
        match self.standby.take() {
            // The platform already started it.
            Some(next) if linked => {
                self.current = Slot {
                    id: next.id,
                    prepared: true,
                    start_on_prepared: false,
                };
            }
            // Prepared but never chained, so nothing started it.
            Some(next) if next.prepared => {
                self.current = Slot {
                    id: next.id,
                    prepared: true,
                    start_on_prepared: false,
                };
                self.start_current().await;
            }
            Some(next) => {
                self.current = Slot::awaiting_start(next.id);
            }
            None => match self.create_player().await {
                Ok(player) => {
                    warn!(%player, "No standby at loop boundary; continuing with a fresh player");
                    self.current = Slot::awaiting_start(player);
                }
                Err(err) => {
                    error!(error = %err, "Loop stalled: could not create a player to continue");
                    self.publish(LoopEvent::Stalled {
                        resource: self.resource,
                        message: err.to_string(),
                    });
                    return;
                }
            },
        }

        self.arm_standby().await;

        self.loop_count += 1;
        debug!(loop_count = self.loop_count, "Loop #{}", self.loop_count);
        self.publish(LoopEvent::Rotated {
            resource: self.resource,
            finished,
            current: self.current.id,
            loop_count: self.loop_count,
        });
    }

    async fn create_player(&self) -> std::result::Result<PlayerId, BridgeError> {
        self.backend
            .create(self.resource, Arc::clone(&self.listener))
            .await
    }

    async fn arm_standby(&mut self) {
        self.standby = None;
        self.standby_linked = false;

        let mut last_error = None;
        for attempt in 1..=self.standby_attempts {
            match self.create_player().await {
                Ok(player) => {
                    trace!(%player, attempt, "Armed standby player");
                    self.standby = Some(Slot::standby(player));
                    return;
                }
                Err(err) => {
                    warn!(attempt, error = %err, "Failed to create standby player");
                    last_error = Some(err);
                }
            }
        }

        let message = last_error.map(|err| err.to_string()).unwrap_or_default();
        error!(
            attempts = self.standby_attempts,
            "No standby player; the next loop boundary will not be gapless"
        );
        self.publish(LoopEvent::StandbyUnavailable {
            resource: self.resource,
            attempts: self.standby_attempts,
            message,
        });
    }

    fn report_player_error(&self, player: PlayerId, operation: &'static str, err: BridgeError) {
        warn!(%player, operation, error = %err, "Media backend call failed");
        self.publish(LoopEvent::PlayerError {
            resource: self.resource,
            player,
            message: format!("{}: {}", operation, err),
        });
    }

    fn publish(&self, event: LoopEvent) {
        if let Some(bus) = &self.event_bus {
            // No subscribers is not an error for the loop.
            let _ = bus.emit(CoreEvent::Loop(event));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoopConfig;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::media::PlayerState;
    use mockall::mock;
    use std::sync::Mutex;

    mock! {
        Backend {}

        #[async_trait]
        impl MediaPlayerBackend for Backend {
            async fn create(
                &self,
                resource: ResourceId,
                listener: Arc<dyn MediaEventListener>,
            ) -> BridgeResult<PlayerId>;
            async fn set_volume(&self, player: PlayerId, volume: Volume) -> BridgeResult<()>;
            async fn volume(&self, player: PlayerId) -> BridgeResult<Volume>;
            async fn set_next(&self, player: PlayerId, next: PlayerId) -> BridgeResult<()>;
            async fn start(&self, player: PlayerId) -> BridgeResult<()>;
            async fn stop(&self, player: PlayerId) -> BridgeResult<()>;
            async fn pause(&self, player: PlayerId) -> BridgeResult<()>;
            async fn reset(&self, player: PlayerId) -> BridgeResult<()>;
            async fn release(&self, player: PlayerId) -> BridgeResult<()>;
            async fn is_playing(&self, player: PlayerId) -> BridgeResult<bool>;
            async fn state(&self, player: PlayerId) -> BridgeResult<PlayerState>;
        }
    }

    fn context(backend: MockBackend, config: LoopConfig) -> PlaybackContext {
        PlaybackContext::new(Arc::new(backend)).with_config(config)
    }

    #[tokio::test]
    async fn construction_fails_fast_when_first_player_cannot_be_created() {
        let mut backend = MockBackend::new();
        backend
            .expect_create()
            .times(1)
            .returning(|_, _| Err(BridgeError::OperationFailed("no decoder".into())));

        let err = LoopRotator::create(&context(backend, LoopConfig::default()), ResourceId(5))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PlaybackError::Bridge(BridgeError::OperationFailed(_))
        ));
    }

    #[tokio::test]
    async fn invalid_initial_volume_is_rejected_before_creating_players() {
        let mut backend = MockBackend::new();
        backend.expect_create().never();

        let err = LoopRotator::create_with_volume(
            &context(backend, LoopConfig::default()),
            ResourceId(5),
            Volume::new(2.0, 0.0),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PlaybackError::InvalidVolume { .. }));
    }

    #[tokio::test]
    async fn standby_creation_is_retried_then_reported() {
        let current = PlayerId::new();
        let mut calls = 0;
        let mut backend = MockBackend::new();
        backend.expect_create().times(3).returning(move |_, _| {
            calls += 1;
            if calls == 1 {
                Ok(current)
            } else {
                Err(BridgeError::OperationFailed("out of players".into()))
            }
        });

        let bus = EventBus::new(8);
        let mut events = bus.subscribe();
        let config = LoopConfig {
            standby_create_attempts: 2,
            release_on_drop: false,
            ..Default::default()
        };
        let ctx = context(backend, config).with_event_bus(bus);

        let rotator = LoopRotator::create(&ctx, ResourceId(5)).await.unwrap();
        let snapshot = rotator.snapshot().await.unwrap();

        assert_eq!(snapshot.current, current);
        assert_eq!(snapshot.standby, None);
        assert_eq!(snapshot.loop_count, 1);
        assert!(matches!(
            events.recv().await.unwrap(),
            CoreEvent::Loop(LoopEvent::StandbyUnavailable { attempts: 2, .. })
        ));
    }

    #[tokio::test]
    async fn prepared_signal_applies_latest_volume() {
        let current = PlayerId::new();
        let standby = PlayerId::new();
        let listener_slot: Arc<Mutex<Option<Arc<dyn MediaEventListener>>>> =
            Arc::new(Mutex::new(None));
        let applied: Arc<Mutex<Vec<(PlayerId, Volume)>>> = Arc::new(Mutex::new(Vec::new()));

        let mut backend = MockBackend::new();
        let ids = Arc::new(Mutex::new(vec![standby, current]));
        let slot = Arc::clone(&listener_slot);
        backend.expect_create().times(2).returning(move |_, listener| {
            *slot.lock().unwrap() = Some(listener);
            Ok(ids.lock().unwrap().pop().unwrap())
        });
        let record = Arc::clone(&applied);
        backend.expect_set_volume().returning(move |player, volume| {
            record.lock().unwrap().push((player, volume));
            Ok(())
        });
        backend.expect_set_next().returning(|_, _| Ok(()));
        backend.expect_start().returning(|_| Ok(()));

        let config = LoopConfig {
            release_on_drop: false,
            ..Default::default()
        };
        let rotator = LoopRotator::create(&context(backend, config), ResourceId(5))
            .await
            .unwrap();

        rotator.set_volume(0.5, 0.25).await.unwrap();
        let listener = listener_slot.lock().unwrap().clone().unwrap();
        listener.on_event(MediaEvent::Prepared(standby));

        let snapshot = rotator.snapshot().await.unwrap();
        assert!(snapshot.standby_linked);
        let applied = applied.lock().unwrap();
        assert_eq!(
            applied.last(),
            Some(&(standby, Volume::new(0.5, 0.25)))
        );
    }

    #[tokio::test]
    async fn release_attempts_both_players_and_reports_first_error() {
        let current = PlayerId::new();
        let standby = PlayerId::new();
        let ids = Arc::new(Mutex::new(vec![standby, current]));
        let released = Arc::new(Mutex::new(Vec::new()));

        let mut backend = MockBackend::new();
        backend
            .expect_create()
            .times(2)
            .returning(move |_, _| Ok(ids.lock().unwrap().pop().unwrap()));
        let record = Arc::clone(&released);
        backend.expect_release().times(2).returning(move |player| {
            record.lock().unwrap().push(player);
            if player == current {
                Err(BridgeError::invalid_state("release", PlayerState::Released))
            } else {
                Ok(())
            }
        });

        let rotator = LoopRotator::create(&context(backend, LoopConfig::default()), ResourceId(5))
            .await
            .unwrap();

        let err = rotator.release().await.unwrap_err();
        assert!(err.is_invalid_state());
        assert_eq!(*released.lock().unwrap(), vec![current, standby]);
    }
}
