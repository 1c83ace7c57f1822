//! Resilient publish/subscribe messaging over a pluggable broker transport.
//!
//! A [`TransportHandle`] wraps the single connection a process holds. Publishing
//! validates its arguments, hands the message over and, for
//! [`QoS::AtLeastOnce`], waits a bounded time for the broker's acknowledgement.
//! A [`Subscription`] runs a background listener that dispatches to a
//! [`SubscriptionHandler`] until it is closed. When no broker is reachable,
//! [`MessagingClient`] records what it would have done instead.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Validated channel names and patterns.
pub mod channel;

/// High-level client with simulation fallback.
pub mod client;

/// Error types.
pub mod error;

/// Shared handle over a transport connection.
pub mod handle;

/// Callbacks for subscription events.
pub mod handler;

/// Messages and publish outcomes.
pub mod message;

/// The publish operation.
pub mod publish;

/// Quality of service levels.
pub mod qos;

/// Recording of actions taken in simulation mode.
pub mod simulation;

/// Subscription lifecycle and background listener.
pub mod subscription;

/// Traits implemented by broker transports.
pub mod transport;

pub use channel::Channel;
pub use client::{MessagingClient, MessagingOptions};
pub use error::{
    ArgumentError, ConnectionError, PublishError, StreamError, SubscribeError, TransportError,
};
pub use handle::TransportHandle;
pub use handler::SubscriptionHandler;
pub use message::{Ack, DeliveryStatus, Message};
pub use publish::{DEFAULT_MAX_PAYLOAD_SIZE, publish};
pub use qos::QoS;
pub use simulation::{SimulatedAction, SimulationRecorder};
pub use subscription::{Subscription, SubscriptionOptions, SubscriptionState, subscribe};
pub use transport::{AckFuture, Connector, Delivery, StreamEvent, Transport, TransportStream};
