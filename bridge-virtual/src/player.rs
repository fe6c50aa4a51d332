//! Virtual media backend.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    media::{
        MediaEvent, MediaEventListener, MediaPlayerBackend, PlayerId, PlayerState, ResourceId,
        Volume,
    },
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::catalog::ResourceCatalog;

/// In-process media framework with per-handle state enforcement.
pub struct VirtualMediaBackend {
    catalog: Arc<ResourceCatalog>,
    auto_prepare: bool,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    players: HashMap<PlayerId, VirtualPlayer>,
    pending_create_failures: u32,
    created: u64,
    released: VecDeque<PlayerId>,
}

struct VirtualPlayer {
    resource: ResourceId,
    state: PlayerState,
    volume: Volume,
    next: Option<PlayerId>,
    listener: Arc<dyn MediaEventListener>,
}

type Dispatch = Vec<(Arc<dyn MediaEventListener>, MediaEvent)>;

/// Released handles kept for state queries; older ones are forgotten and
/// report `UnknownPlayer`.
const RELEASED_RETAINED: usize = 64;

impl VirtualMediaBackend {
    /// Create a backend that prepares handles as soon as they are created.
    pub fn new(catalog: Arc<ResourceCatalog>) -> Self {
        Self {
            catalog,
            auto_prepare: true,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// When disabled, handles stay `Preparing` until
    /// [`finish_preparing`](Self::finish_preparing) is called.
    pub fn with_auto_prepare(mut self, auto_prepare: bool) -> Self {
        self.auto_prepare = auto_prepare;
        self
    }

    /// Make the next `count` calls to `create` fail.
    pub fn fail_next_creates(&self, count: u32) {
        self.inner.lock().pending_create_failures = count;
    }

    /// Finish preparing a handle and deliver its `Prepared` signal.
    pub fn finish_preparing(&self, player: PlayerId) -> Result<()> {
        let dispatch = {
            let mut inner = self.inner.lock();
            let entry = inner.player_mut(player)?;
            if entry.state != PlayerState::Preparing {
                return Err(BridgeError::invalid_state("prepare", entry.state));
            }
            entry.state = PlayerState::Prepared;
            vec![(Arc::clone(&entry.listener), MediaEvent::Prepared(player))]
        };
        deliver(dispatch);
        Ok(())
    }

    /// Simulate the handle reaching the natural end of its resource.
    ///
    /// A prepared successor starts playing before the `Completed` signal is
    /// delivered, so there is never an instant with nothing playing.
    pub fn complete(&self, player: PlayerId) -> Result<()> {
        let dispatch = {
            let mut inner = self.inner.lock();
            let entry = inner.player_mut(player)?;
            if entry.state != PlayerState::Playing {
                return Err(BridgeError::invalid_state("complete", entry.state));
            }
            entry.state = PlayerState::Completed;
            let listener = Arc::clone(&entry.listener);
            let next = entry.next;

            if let Some(next) = next {
                if let Some(successor) = inner.players.get_mut(&next) {
                    if successor.state == PlayerState::Prepared {
                        successor.state = PlayerState::Playing;
                        trace!(%player, %next, "Successor took over");
                    }
                }
            }

            vec![(listener, MediaEvent::Completed(player))]
        };
        deliver(dispatch);
        Ok(())
    }

    /// Deliver an asynchronous error signal for a handle.
    pub fn raise_error(&self, player: PlayerId, message: impl Into<String>) -> Result<()> {
        let dispatch = {
            let mut inner = self.inner.lock();
            let entry = inner.player_mut(player)?;
            vec![(
                Arc::clone(&entry.listener),
                MediaEvent::Error {
                    player,
                    message: message.into(),
                },
            )]
        };
        deliver(dispatch);
        Ok(())
    }

    pub fn player_state(&self, player: PlayerId) -> Option<PlayerState> {
        self.inner.lock().players.get(&player).map(|p| p.state)
    }

    pub fn player_volume(&self, player: PlayerId) -> Option<Volume> {
        self.inner.lock().players.get(&player).map(|p| p.volume)
    }

    pub fn player_resource(&self, player: PlayerId) -> Option<ResourceId> {
        self.inner.lock().players.get(&player).map(|p| p.resource)
    }

    /// Successor designated for `player`, if any.
    pub fn successor_of(&self, player: PlayerId) -> Option<PlayerId> {
        self.inner.lock().players.get(&player).and_then(|p| p.next)
    }

    /// Number of handles currently playing.
    pub fn playing_count(&self) -> usize {
        self.count_where(|state| state == PlayerState::Playing)
    }

    /// Number of handles not yet released.
    pub fn live_count(&self) -> usize {
        self.count_where(|state| !state.is_released())
    }

    /// Total handles created over the backend's lifetime.
    pub fn created_count(&self) -> u64 {
        self.inner.lock().created
    }

    fn count_where(&self, predicate: impl Fn(PlayerState) -> bool) -> usize {
        self.inner
            .lock()
            .players
            .values()
            .filter(|p| predicate(p.state))
            .count()
    }

    fn transition(
        &self,
        player: PlayerId,
        operation: &'static str,
        allowed: &[PlayerState],
        target: PlayerState,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        let entry = inner.player_mut(player)?;
        if !allowed.contains(&entry.state) {
            return Err(BridgeError::invalid_state(operation, entry.state));
        }
        trace!(%player, from = ?entry.state, to = ?target, "{}", operation);
        entry.state = target;
        Ok(())
    }
}

impl Inner {
    fn player_mut(&mut self, player: PlayerId) -> Result<&mut VirtualPlayer> {
        self.players
            .get_mut(&player)
            .ok_or(BridgeError::UnknownPlayer(player))
    }

    /// Like `player_mut` but rejects released handles.
    fn live_player_mut(
        &mut self,
        player: PlayerId,
        operation: &'static str,
    ) -> Result<&mut VirtualPlayer> {
        let entry = self.player_mut(player)?;
        if entry.state.is_released() {
            return Err(BridgeError::invalid_state(operation, entry.state));
        }
        Ok(entry)
    }
}

fn deliver(dispatch: Dispatch) {
    for (listener, event) in dispatch {
        listener.on_event(event);
    }
}

#[async_trait]
impl MediaPlayerBackend for VirtualMediaBackend {
    async fn create(
        &self,
        resource: ResourceId,
        listener: Arc<dyn MediaEventListener>,
    ) -> Result<PlayerId> {
        if !self.catalog.contains(resource) {
            return Err(BridgeError::ResourceNotFound(resource.to_string()));
        }

        let player = PlayerId::new();
        let dispatch = {
            let mut inner = self.inner.lock();
            if inner.pending_create_failures > 0 {
                inner.pending_create_failures -= 1;
                return Err(BridgeError::OperationFailed(format!(
                    "could not allocate a player for {}",
                    resource
                )));
            }

            let state = if self.auto_prepare {
                PlayerState::Prepared
            } else {
                PlayerState::Preparing
            };
            inner.players.insert(
                player,
                VirtualPlayer {
                    resource,
                    state,
                    volume: Volume::UNITY,
                    next: None,
                    listener: Arc::clone(&listener),
                },
            );
            inner.created += 1;

            if self.auto_prepare {
                vec![(listener, MediaEvent::Prepared(player))]
            } else {
                Vec::new()
            }
        };

        debug!(%player, %resource, "Created virtual player");
        deliver(dispatch);
        Ok(player)
    }

    async fn set_volume(&self, player: PlayerId, volume: Volume) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.live_player_mut(player, "set_volume")?.volume = volume;
        Ok(())
    }

    async fn volume(&self, player: PlayerId) -> Result<Volume> {
        let mut inner = self.inner.lock();
        Ok(inner.live_player_mut(player, "volume")?.volume)
    }

    async fn set_next(&self, player: PlayerId, next: PlayerId) -> Result<()> {
        if player == next {
            return Err(BridgeError::OperationFailed(
                "a player cannot be its own successor".to_string(),
            ));
        }

        let mut inner = self.inner.lock();
        let next_state = inner.player_mut(next)?.state;
        if next_state != PlayerState::Prepared {
            return Err(BridgeError::invalid_state("set_next", next_state));
        }
        inner.live_player_mut(player, "set_next")?.next = Some(next);
        Ok(())
    }

    async fn start(&self, player: PlayerId) -> Result<()> {
        self.transition(
            player,
            "start",
            &[
                PlayerState::Prepared,
                PlayerState::Playing,
                PlayerState::Paused,
                PlayerState::Completed,
            ],
            PlayerState::Playing,
        )
    }

    async fn stop(&self, player: PlayerId) -> Result<()> {
        self.transition(
            player,
            "stop",
            &[
                PlayerState::Prepared,
                PlayerState::Playing,
                PlayerState::Paused,
                PlayerState::Stopped,
                PlayerState::Completed,
            ],
            PlayerState::Stopped,
        )
    }

    async fn pause(&self, player: PlayerId) -> Result<()> {
        self.transition(
            player,
            "pause",
            &[PlayerState::Playing, PlayerState::Paused],
            PlayerState::Paused,
        )
    }

    async fn reset(&self, player: PlayerId) -> Result<()> {
        let mut inner = self.inner.lock();
        let entry = inner.live_player_mut(player, "reset")?;
        entry.state = PlayerState::Uninitialized;
        entry.next = None;
        Ok(())
    }

    async fn release(&self, player: PlayerId) -> Result<()> {
        let mut inner = self.inner.lock();
        let entry = inner.live_player_mut(player, "release")?;
        entry.state = PlayerState::Released;
        entry.next = None;
        inner.released.push_back(player);
        while inner.released.len() > RELEASED_RETAINED {
            if let Some(oldest) = inner.released.pop_front() {
                inner.players.remove(&oldest);
            }
        }
        debug!(%player, "Released virtual player");
        Ok(())
    }

    async fn is_playing(&self, player: PlayerId) -> Result<bool> {
        let mut inner = self.inner.lock();
        Ok(inner.live_player_mut(player, "is_playing")?.state == PlayerState::Playing)
    }

    async fn state(&self, player: PlayerId) -> Result<PlayerState> {
        let mut inner = self.inner.lock();
        Ok(inner.player_mut(player)?.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingListener {
        events: Mutex<Vec<MediaEvent>>,
    }

    impl MediaEventListener for RecordingListener {
        fn on_event(&self, event: MediaEvent) {
            self.events.lock().push(event);
        }
    }

    fn backend() -> (VirtualMediaBackend, Arc<RecordingListener>) {
        let catalog = Arc::new(ResourceCatalog::new().with_resource("rain", 1));
        (
            VirtualMediaBackend::new(catalog),
            Arc::new(RecordingListener::default()),
        )
    }

    #[tokio::test]
    async fn create_prepares_and_signals() {
        let (backend, listener) = backend();
        let id = backend.create(ResourceId(1), listener.clone()).await.unwrap();

        assert_eq!(backend.player_state(id), Some(PlayerState::Prepared));
        assert_eq!(*listener.events.lock(), vec![MediaEvent::Prepared(id)]);
        assert_eq!(backend.created_count(), 1);
    }

    #[tokio::test]
    async fn create_unknown_resource_fails() {
        let (backend, listener) = backend();
        let err = backend.create(ResourceId(99), listener).await.unwrap_err();
        assert!(matches!(err, BridgeError::ResourceNotFound(_)));
    }

    #[tokio::test]
    async fn injected_create_failures_are_consumed() {
        let (backend, listener) = backend();
        backend.fail_next_creates(1);

        assert!(backend.create(ResourceId(1), listener.clone()).await.is_err());
        assert!(backend.create(ResourceId(1), listener).await.is_ok());
    }

    #[tokio::test]
    async fn manual_prepare_gates_start() {
        let (backend, listener) = backend();
        let backend = backend.with_auto_prepare(false);
        let id = backend.create(ResourceId(1), listener.clone()).await.unwrap();

        assert!(listener.events.lock().is_empty());
        let err = backend.start(id).await.unwrap_err();
        assert_eq!(
            err,
            BridgeError::invalid_state("start", PlayerState::Preparing)
        );

        backend.finish_preparing(id).unwrap();
        backend.start(id).await.unwrap();
        assert!(backend.is_playing(id).await.unwrap());
    }

    #[tokio::test]
    async fn completion_hands_over_to_successor() {
        let (backend, listener) = backend();
        let first = backend.create(ResourceId(1), listener.clone()).await.unwrap();
        let second = backend.create(ResourceId(1), listener.clone()).await.unwrap();

        backend.start(first).await.unwrap();
        backend.set_next(first, second).await.unwrap();
        backend.complete(first).unwrap();

        assert_eq!(backend.player_state(first), Some(PlayerState::Completed));
        assert_eq!(backend.player_state(second), Some(PlayerState::Playing));
        assert_eq!(backend.playing_count(), 1);
        assert_eq!(
            listener.events.lock().last(),
            Some(&MediaEvent::Completed(first))
        );
    }

    #[tokio::test]
    async fn set_next_requires_prepared_successor() {
        let (backend, listener) = backend();
        let first = backend.create(ResourceId(1), listener.clone()).await.unwrap();
        let second = backend.create(ResourceId(1), listener).await.unwrap();
        backend.start(second).await.unwrap();

        let err = backend.set_next(first, second).await.unwrap_err();
        assert_eq!(
            err,
            BridgeError::invalid_state("set_next", PlayerState::Playing)
        );
        assert!(backend.set_next(first, first).await.is_err());
    }

    #[tokio::test]
    async fn released_player_rejects_everything() {
        let (backend, listener) = backend();
        let id = backend.create(ResourceId(1), listener).await.unwrap();
        backend.release(id).await.unwrap();

        assert_eq!(backend.live_count(), 0);
        assert!(backend.release(id).await.is_err());
        assert!(backend.start(id).await.is_err());
        assert!(backend.is_playing(id).await.is_err());
        assert!(backend.set_volume(id, Volume::MUTED).await.is_err());
        assert_eq!(backend.state(id).await.unwrap(), PlayerState::Released);
    }

    #[tokio::test]
    async fn pause_and_stop_follow_state_machine() {
        let (backend, listener) = backend();
        let id = backend.create(ResourceId(1), listener).await.unwrap();

        assert!(backend.pause(id).await.is_err());
        backend.start(id).await.unwrap();
        backend.pause(id).await.unwrap();
        assert_eq!(backend.player_state(id), Some(PlayerState::Paused));
        backend.stop(id).await.unwrap();
        assert!(backend.start(id).await.is_err());
        backend.reset(id).await.unwrap();
        assert_eq!(backend.player_state(id), Some(PlayerState::Uninitialized));
    }

    #[tokio::test]
    async fn released_players_are_pruned_beyond_retention() {
        let (backend, listener) = backend();
        let mut ids = Vec::new();
        for _ in 0..RELEASED_RETAINED + 2 {
            let id = backend
                .create(ResourceId(1), listener.clone())
                .await
                .unwrap();
            backend.release(id).await.unwrap();
            ids.push(id);
        }
        let live = backend.create(ResourceId(1), listener).await.unwrap();

        assert_eq!(backend.inner.lock().players.len(), RELEASED_RETAINED + 1);
        assert_eq!(backend.player_state(ids[0]), None);
        assert_eq!(backend.player_state(ids[1]), None);
        assert_eq!(
            backend.player_state(ids[RELEASED_RETAINED + 1]),
            Some(PlayerState::Released)
        );
        assert_eq!(backend.player_state(live), Some(PlayerState::Prepared));
        assert_eq!(
            backend.start(ids[0]).await.unwrap_err(),
            BridgeError::UnknownPlayer(ids[0])
        );
    }

    #[tokio::test]
    async fn unknown_player_is_reported() {
        let (backend, _) = backend();
        let ghost = PlayerId::new();
        assert_eq!(
            backend.start(ghost).await.unwrap_err(),
            BridgeError::UnknownPlayer(ghost)
        );
    }
}
