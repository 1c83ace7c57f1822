use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use edgelink_messaging::{ArgumentError, Channel, Message, StreamError};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::transport::MemoryConnector;

/// How the broker acknowledges at-least-once publishes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AckBehavior {
    /// Acknowledge straight away.
    #[default]
    Immediate,

    /// Acknowledge after the given delay.
    Delayed(Duration),

    /// Never acknowledge.
    Never,
}

/// How the broker answers a subscribe handshake.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HandshakeBehavior {
    /// Confirm straight away.
    #[default]
    Immediate,

    /// Never confirm.
    Never,

    /// Refuse the subscription.
    Fail,
}

/// Options for [`MemoryBroker`].
#[derive(Clone, Debug)]
pub struct MemoryBrokerOptions {
    /// Initial acknowledgement behavior.
    pub ack: AckBehavior,

    /// Initial handshake behavior.
    pub handshake: HandshakeBehavior,

    /// Events buffered per stream before it starts lagging.
    pub capacity: usize,
}

impl Default for MemoryBrokerOptions {
    fn default() -> Self {
        Self {
            ack: AckBehavior::default(),
            handshake: HandshakeBehavior::default(),
            capacity: 1024,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) enum BrokerEvent {
    Message(Message),
    Error { pattern: String, error: StreamError },
    Close { pattern: String },
    Disconnect,
}

#[derive(Debug)]
pub(crate) struct BrokerState {
    pub(crate) events: broadcast::Sender<BrokerEvent>,
    available: AtomicBool,
    ack: Mutex<AckBehavior>,
    handshake: Mutex<HandshakeBehavior>,
    connections: DashMap<Uuid, Arc<AtomicBool>>,
    streams: DashMap<Uuid, Channel>,
    published: Mutex<Vec<Message>>,
    releases: AtomicUsize,
}

/// An in-process broker.
///
/// Routes every accepted message to each open stream whose pattern matches.
/// Clones share the same broker. Faults can be injected at any time.
#[derive(Clone, Debug)]
pub struct MemoryBroker {
    pub(crate) state: Arc<BrokerState>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new(MemoryBrokerOptions::default())
    }
}

impl MemoryBroker {
    /// Creates a broker.
    #[must_use]
    pub fn new(options: MemoryBrokerOptions) -> Self {
        let (events, _) = broadcast::channel(options.capacity.max(1));

        Self {
            state: Arc::new(BrokerState {
                events,
                available: AtomicBool::new(true),
                ack: Mutex::new(options.ack),
                handshake: Mutex::new(options.handshake),
                connections: DashMap::new(),
                streams: DashMap::new(),
                published: Mutex::new(Vec::new()),
                releases: AtomicUsize::new(0),
            }),
        }
    }

    /// A connector for this broker.
    #[must_use]
    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector::new(self.clone())
    }

    /// Whether new connections are accepted.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.state.available.load(Ordering::Acquire)
    }

    /// Accepts or refuses new connections. Existing connections are unaffected.
    pub fn set_available(&self, available: bool) {
        info!(available, "memory broker availability changed");
        self.state.available.store(available, Ordering::Release);
    }

    /// Changes how later at-least-once publishes are acknowledged.
    pub fn set_ack_behavior(&self, behavior: AckBehavior) {
        *self.state.ack.lock() = behavior;
    }

    /// Changes how later subscribe handshakes are answered.
    pub fn set_handshake_behavior(&self, behavior: HandshakeBehavior) {
        *self.state.handshake.lock() = behavior;
    }

    /// Delivers a message from outside any client. It is routed like a publish
    /// but not recorded in [`MemoryBroker::published`].
    ///
    /// # Errors
    ///
    /// Returns an [`ArgumentError`] if `channel` is not a publishable channel.
    pub fn inject_message(
        &self,
        channel: &str,
        payload: impl Into<Bytes>,
    ) -> Result<(), ArgumentError> {
        let message = Message::new(Channel::publishable(channel)?, payload);
        self.route(BrokerEvent::Message(message));
        Ok(())
    }

    /// Raises `error` on every stream subscribed with exactly `pattern`.
    pub fn inject_stream_error(&self, pattern: &str, error: StreamError) {
        debug!(pattern, error = %error, "injecting stream error");
        self.route(BrokerEvent::Error {
            pattern: pattern.to_string(),
            error,
        });
    }

    /// Closes every stream subscribed with exactly `pattern`.
    pub fn close_streams(&self, pattern: &str) {
        debug!(pattern, "closing streams");
        self.route(BrokerEvent::Close {
            pattern: pattern.to_string(),
        });
    }

    /// Drops every current connection. Later sends on them fail and every open
    /// stream sees an interruption.
    pub fn disconnect_all(&self) {
        info!(
            connections = self.state.connections.len(),
            "disconnecting all clients"
        );
        for connection in &self.state.connections {
            connection.value().store(false, Ordering::Release);
        }
        self.route(BrokerEvent::Disconnect);
    }

    /// Every message accepted from a client, in order.
    #[must_use]
    pub fn published(&self) -> Vec<Message> {
        self.state.published.lock().clone()
    }

    /// Streams opened and not yet released.
    #[must_use]
    pub fn stream_count(&self) -> usize {
        self.state.streams.len()
    }

    /// Streams released so far.
    #[must_use]
    pub fn release_count(&self) -> usize {
        self.state.releases.load(Ordering::Acquire)
    }

    /// Live client connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.state
            .connections
            .iter()
            .filter(|c| c.value().load(Ordering::Acquire))
            .count()
    }

    pub(crate) fn ack_behavior(&self) -> AckBehavior {
        *self.state.ack.lock()
    }

    pub(crate) fn handshake_behavior(&self) -> HandshakeBehavior {
        *self.state.handshake.lock()
    }

    pub(crate) fn accept(&self, message: Message) {
        trace!(channel = %message.channel(), "message accepted");
        self.state.published.lock().push(message.clone());
        self.route(BrokerEvent::Message(message));
    }

    pub(crate) fn register_connection(&self, id: Uuid, connected: Arc<AtomicBool>) {
        self.state.connections.insert(id, connected);
    }

    pub(crate) fn remove_connection(&self, id: Uuid) {
        self.state.connections.remove(&id);
    }

    pub(crate) fn open_stream(
        &self,
        id: Uuid,
        pattern: Channel,
    ) -> broadcast::Receiver<BrokerEvent> {
        let receiver = self.state.events.subscribe();
        self.state.streams.insert(id, pattern);
        receiver
    }

    pub(crate) fn release_stream(&self, id: Uuid) {
        if self.state.streams.remove(&id).is_some() {
            self.state.releases.fetch_add(1, Ordering::AcqRel);
        }
    }

    fn route(&self, event: BrokerEvent) {
        // No open streams is not an error.
        let _ = self.state.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let broker = MemoryBroker::default();
        assert!(broker.is_available());
        assert_eq!(broker.ack_behavior(), AckBehavior::Immediate);
        assert_eq!(broker.handshake_behavior(), HandshakeBehavior::Immediate);
        assert_eq!(broker.stream_count(), 0);
        assert!(broker.published().is_empty());
    }

    #[test]
    fn test_inject_message_rejects_patterns() {
        let broker = MemoryBroker::default();
        assert_eq!(
            broker.inject_message("a/#", "x"),
            Err(ArgumentError::WildcardPublish("a/#".to_string()))
        );
        broker.inject_message("a/b", "x").unwrap();
        assert!(broker.published().is_empty());
    }

    #[test]
    fn test_release_counted_once() {
        let broker = MemoryBroker::default();
        let id = Uuid::new_v4();
        let _receiver = broker.open_stream(id, Channel::new("a/#").unwrap());
        assert_eq!(broker.stream_count(), 1);

        broker.release_stream(id);
        broker.release_stream(id);
        assert_eq!(broker.stream_count(), 0);
        assert_eq!(broker.release_count(), 1);
    }
}
