//! # Event Bus System
//!
//! Broadcasts loop and sound lifecycle notifications to host subscribers
//! using `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! - **Event Types**: [`LoopEvent`] for the per-resource rotator,
//!   [`SoundEvent`] for the keyed sound pool, both wrapped in [`CoreEvent`]
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Receiver wrapper with optional filtering
//!
//! Publishing never blocks and never fails the publisher: a bus with no
//! subscribers simply drops the event.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, LoopEvent};
//! use bridge_traits::media::ResourceId;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Loop(LoopEvent::Released {
//!     resource: ResourceId::new(3),
//!     loop_count: 4,
//! }))
//! .ok();
//!
//! assert!(matches!(rx.recv().await, Ok(CoreEvent::Loop(_))));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Subscribers that fall behind by more than the buffer size receive
//! `RecvError::Lagged(n)` and may continue. `RecvError::Closed` signals that
//! every publisher has shut down.

use bridge_traits::media::{PlayerId, ResourceId};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Loop(LoopEvent),
    Sound(SoundEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Loop(e) => e.description(),
            CoreEvent::Sound(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Loop(LoopEvent::Stalled { .. }) => EventSeverity::Error,
            CoreEvent::Loop(LoopEvent::PlayerError { .. }) => EventSeverity::Error,
            CoreEvent::Loop(LoopEvent::StandbyUnavailable { .. }) => EventSeverity::Warning,
            CoreEvent::Loop(LoopEvent::Started { .. }) => EventSeverity::Info,
            CoreEvent::Loop(LoopEvent::Released { .. }) => EventSeverity::Info,
            CoreEvent::Sound(_) => EventSeverity::Info,
            CoreEvent::Loop(LoopEvent::Rotated { .. }) => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Loop Events
// ============================================================================

/// Events raised by a loop rotator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LoopEvent {
    /// A handle was started after its prepared signal.
    Started {
        resource: ResourceId,
        player: PlayerId,
    },
    /// The standby handle was promoted at a completion boundary.
    Rotated {
        resource: ResourceId,
        /// Handle that finished and was released.
        finished: PlayerId,
        /// Handle now occupying the current slot.
        current: PlayerId,
        loop_count: u64,
    },
    /// Every attempt to create a standby handle failed; the next boundary
    /// will have a gap.
    StandbyUnavailable {
        resource: ResourceId,
        attempts: u32,
        message: String,
    },
    /// No handle could be created to continue the loop.
    Stalled { resource: ResourceId, message: String },
    /// The platform reported an error for one of the loop's handles, or a
    /// callback-side call into the platform failed.
    PlayerError {
        resource: ResourceId,
        player: PlayerId,
        message: String,
    },
    /// Both handles were released.
    Released { resource: ResourceId, loop_count: u64 },
}

impl LoopEvent {
    fn description(&self) -> &str {
        match self {
            LoopEvent::Started { .. } => "Loop playback started",
            LoopEvent::Rotated { .. } => "Loop rotated to standby handle",
            LoopEvent::StandbyUnavailable { .. } => "Standby handle unavailable",
            LoopEvent::Stalled { .. } => "Loop stalled",
            LoopEvent::PlayerError { .. } => "Loop player error",
            LoopEvent::Released { .. } => "Loop released",
        }
    }

    /// Resource the event belongs to.
    pub fn resource(&self) -> ResourceId {
        match self {
            LoopEvent::Started { resource, .. }
            | LoopEvent::Rotated { resource, .. }
            | LoopEvent::StandbyUnavailable { resource, .. }
            | LoopEvent::Stalled { resource, .. }
            | LoopEvent::PlayerError { resource, .. }
            | LoopEvent::Released { resource, .. } => *resource,
        }
    }
}

// ============================================================================
// Sound Events
// ============================================================================

/// Events raised by the keyed sound pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SoundEvent {
    /// A sound name was resolved and registered under a key.
    Prepared {
        key: i32,
        name: String,
        resource: ResourceId,
    },
    /// A sound was removed from the pool.
    Released { key: i32 },
}

impl SoundEvent {
    fn description(&self) -> &str {
        match self {
            SoundEvent::Prepared { .. } => "Sound prepared",
            SoundEvent::Released { .. } => "Sound released",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::new(16);
/// let loops_only = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Loop(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive a matching event without blocking.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn rotated(loop_count: u64) -> CoreEvent {
        CoreEvent::Loop(LoopEvent::Rotated {
            resource: ResourceId::new(1),
            finished: PlayerId::new(),
            current: PlayerId::new(),
            loop_count,
        })
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.emit(rotated(2)).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = rotated(2);
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Sound(_)));

        bus.emit(rotated(2)).unwrap();
        bus.emit(CoreEvent::Sound(SoundEvent::Released { key: 4 }))
            .unwrap();

        let received = stream.recv().await.unwrap();
        assert_eq!(received, CoreEvent::Sound(SoundEvent::Released { key: 4 }));
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut stream = EventStream::new(bus.subscribe());

        for n in 0..5 {
            bus.emit(rotated(n)).unwrap();
        }

        assert!(matches!(stream.try_recv(), Some(Err(RecvError::Lagged(_)))));
        assert!(matches!(stream.try_recv(), Some(Ok(_))));
    }

    #[test]
    fn test_event_severity() {
        let stalled = CoreEvent::Loop(LoopEvent::Stalled {
            resource: ResourceId::new(1),
            message: "no player".into(),
        });
        assert_eq!(stalled.severity(), EventSeverity::Error);
        assert_eq!(rotated(2).severity(), EventSeverity::Debug);
        assert!(EventSeverity::Warning > EventSeverity::Info);
    }

    #[test]
    fn test_event_description_and_resource() {
        let event = LoopEvent::Released {
            resource: ResourceId::new(9),
            loop_count: 3,
        };
        assert_eq!(event.resource(), ResourceId::new(9));
        assert_eq!(CoreEvent::Loop(event).description(), "Loop released");
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Sound(SoundEvent::Prepared {
            key: 1,
            name: "rain".into(),
            resource: ResourceId::new(5),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Sound");
        assert_eq!(json["payload"]["event"], "Prepared");
        assert_eq!(json["payload"]["name"], "rain");
    }
}
