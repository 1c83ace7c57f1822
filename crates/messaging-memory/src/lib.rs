//! In-process broker and transport for `edgelink-messaging`.
//!
//! Used as the device-local broker during development and as a fault-injecting
//! fake in tests.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// The broker and its fault injection controls.
pub mod broker;

/// Streams delivering events for one subscription.
pub mod stream;

/// Connector and transport.
pub mod transport;

pub use broker::{AckBehavior, HandshakeBehavior, MemoryBroker, MemoryBrokerOptions};
pub use stream::MemoryStream;
pub use transport::{MemoryConnector, MemoryTransport};
