//! NATS transport for `edgelink-messaging`.
//!
//! Channels are carried as subjects (`local/alerts/*` becomes `local.alerts.*`).
//! Core NATS has no per-message acknowledgement, so at-least-once publishes are
//! confirmed with a flush round-trip.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Streams backed by NATS subscriptions.
pub mod stream;

/// Mapping between channels and NATS subjects.
pub mod subject;

/// Connector and transport.
pub mod transport;

pub use stream::NatsStream;
pub use transport::{NatsConnector, NatsConnectorOptions, NatsTransport};
