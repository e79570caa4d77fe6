//! Multi-subscriber publication of outcome/transition events (C6).
//!
//! `tokio::sync::broadcast` already gives the semantics spec.md §4.6 asks
//! for: a hot channel where subscribers only observe events published after
//! they subscribed, with events from a single publisher observed by every
//! subscriber in publication order. Backpressure is delegated to the
//! subscriber via the channel's bounded capacity; a subscriber that falls too
//! far behind observes [`tokio::sync::broadcast::error::RecvError::Lagged`].

use std::time::SystemTime;

use tokio::sync::broadcast;
use tracing::trace;

use crate::circuit_breaker::CircuitBreakerState;

/// Default channel capacity for a core instance's event stream.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// An event published by a circuit breaker or rate limiter.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A call succeeded and was recorded.
    Success {
        name: String,
        created_at: SystemTime,
    },
    /// A call failed and was recorded (counted toward the failure rate).
    Error {
        name: String,
        created_at: SystemTime,
        message: String,
    },
    /// A call failed but the configured predicate chose not to record it.
    IgnoredError {
        name: String,
        created_at: SystemTime,
        message: String,
    },
    /// The circuit breaker changed state.
    StateTransition {
        name: String,
        created_at: SystemTime,
        from: CircuitBreakerState,
        to: CircuitBreakerState,
    },
    /// A rate limiter granted a permit.
    PermissionAcquired {
        name: String,
        created_at: SystemTime,
    },
    /// A rate limiter denied a permit (timeout elapsed with none available).
    PermissionDenied {
        name: String,
        created_at: SystemTime,
    },
}

impl Event {
    /// Name of the core instance that published this event.
    pub fn name(&self) -> &str {
        match self {
            Event::Success { name, .. }
            | Event::Error { name, .. }
            | Event::IgnoredError { name, .. }
            | Event::StateTransition { name, .. }
            | Event::PermissionAcquired { name, .. }
            | Event::PermissionDenied { name, .. } => name,
        }
    }

    /// When the event was created.
    pub fn created_at(&self) -> SystemTime {
        match self {
            Event::Success { created_at, .. }
            | Event::Error { created_at, .. }
            | Event::IgnoredError { created_at, .. }
            | Event::StateTransition { created_at, .. }
            | Event::PermissionAcquired { created_at, .. }
            | Event::PermissionDenied { created_at, .. } => *created_at,
        }
    }
}

/// Publisher half of a core instance's event stream.
///
/// One `EventStream` is owned by each `CircuitBreaker` / rate limiter; callers
/// obtain subscriptions via [`EventStream::subscribe`], returning an
/// [`EventStreamHandle`].
pub struct EventStream {
    sender: broadcast::Sender<Event>,
}

impl EventStream {
    /// Create a new event stream with the default buffer capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_BUFFER)
    }

    /// Create a new event stream with a specific subscriber buffer capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Publishing with no subscribers is normal operation (nobody is watching
    /// yet), logged at `trace!` rather than treated as an error.
    pub fn publish(&self, event: Event) {
        if self.sender.send(event).is_err() {
            trace!("event published with no subscribers");
        }
    }

    /// Subscribe to events published after this call returns.
    pub fn subscribe(&self) -> EventStreamHandle {
        EventStreamHandle {
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of currently active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventStream {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscriber half of an [`EventStream`].
pub struct EventStreamHandle {
    receiver: broadcast::Receiver<Event>,
}

impl EventStreamHandle {
    /// Await the next event, or `Err` if this subscriber lagged and dropped
    /// events, or the publisher was dropped.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Non-blocking poll for the next event.
    pub fn try_recv(&mut self) -> Result<Event, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let stream = EventStream::new();
        let mut handle = stream.subscribe();

        stream.publish(Event::Success {
            name: "svc".into(),
            created_at: SystemTime::now(),
        });

        let event = handle.recv().await.unwrap();
        assert_eq!(event.name(), "svc");
        assert!(matches!(event, Event::Success { .. }));
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_events() {
        let stream = EventStream::new();
        stream.publish(Event::Success {
            name: "svc".into(),
            created_at: SystemTime::now(),
        });

        let mut handle = stream.subscribe();
        stream.publish(Event::PermissionAcquired {
            name: "svc".into(),
            created_at: SystemTime::now(),
        });

        let event = handle.recv().await.unwrap();
        assert!(matches!(event, Event::PermissionAcquired { .. }));
    }

    #[tokio::test]
    async fn multiple_subscribers_observe_publication_order() {
        let stream = EventStream::new();
        let mut a = stream.subscribe();
        let mut b = stream.subscribe();

        for i in 0..5 {
            stream.publish(Event::Success {
                name: format!("svc-{i}"),
                created_at: SystemTime::now(),
            });
        }

        for i in 0..5 {
            let ea = a.recv().await.unwrap();
            let eb = b.recv().await.unwrap();
            assert_eq!(ea.name(), format!("svc-{i}"));
            assert_eq!(eb.name(), format!("svc-{i}"));
        }
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let stream = EventStream::new();
        stream.publish(Event::PermissionDenied {
            name: "svc".into(),
            created_at: SystemTime::now(),
        });
    }
}
