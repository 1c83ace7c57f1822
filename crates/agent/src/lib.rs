//! Device-side components built on `edgelink-messaging`.
//!
//! Each component runs against any [`Transport`](edgelink_messaging::Transport)
//! until its shutdown token fires, so the same code drives a NATS server, the
//! in-process broker, or a simulated client.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

/// Publisher, subscriber, processor and controller components.
pub mod components;

/// JSON payloads exchanged by the components.
pub mod payload;

pub use error::Error;
