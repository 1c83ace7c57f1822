use std::fmt::{self, Debug};

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::channel::Channel;
use crate::error::{ConnectionError, StreamError, TransportError};
use crate::message::Message;
use crate::qos::QoS;

/// Pending confirmation for exactly one publish. Resolves once.
pub type AckFuture = BoxFuture<'static, Result<(), TransportError>>;

/// Result of handing a message to a transport.
pub enum Delivery {
    /// The transport accepted the message; no acknowledgement will follow.
    HandedOff,

    /// The broker will confirm the message through the contained future.
    Pending(AckFuture),
}

impl Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HandedOff => f.write_str("HandedOff"),
            Self::Pending(_) => f.write_str("Pending(<ack>)"),
        }
    }
}

/// Something a transport stream can yield.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    /// An inbound message matching the stream's pattern.
    Message(Message),

    /// A stream-level fault. The stream may keep going afterwards.
    Error(StreamError),

    /// The broker closed the stream.
    Closed,
}

/// Establishes transports. Each call opens a new connection.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// The transport type produced.
    type Transport: Transport;

    /// Connects to the broker.
    async fn connect(&self) -> Result<Self::Transport, ConnectionError>;
}

/// A live connection to a message bus.
///
/// Implementations must make concurrent `send` calls safe; framing of two sends
/// must never interleave.
#[async_trait]
pub trait Transport: Debug + Send + Sync + 'static {
    /// Stream type opened by subscriptions.
    type Stream: TransportStream;

    /// Hands a message to the broker. For [`QoS::AtLeastOnce`] the returned
    /// delivery carries the pending acknowledgement.
    async fn send(&self, message: Message, qos: QoS) -> Result<Delivery, TransportError>;

    /// Opens a stream of events for every channel matching `pattern`.
    async fn open_stream(&self, pattern: &Channel) -> Result<Self::Stream, TransportError>;

    /// Tears the connection down. Streams opened from it end.
    async fn close(&self) -> Result<(), TransportError>;

    /// Whether the underlying connection is currently usable.
    fn is_connected(&self) -> bool;
}

/// Transport side of one subscription.
#[async_trait]
pub trait TransportStream: Send + 'static {
    /// Resolves once the broker has confirmed the subscription.
    async fn ready(&mut self) -> Result<(), TransportError>;

    /// Next event, or `None` once the stream has ended.
    ///
    /// Must be cancel safe: dropping the future must not lose an event.
    async fn next_event(&mut self) -> Option<StreamEvent>;

    /// Frees broker-side resources held for the stream.
    async fn release(self) -> Result<(), TransportError>;
}
