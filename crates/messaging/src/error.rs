use std::time::Duration;

use thiserror::Error;

/// Malformed call inputs. Always raised before any I/O takes place.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ArgumentError {
    /// Channel names must contain at least one segment.
    #[error("channel name must not be empty")]
    EmptyChannel,

    /// A channel segment was empty (leading, trailing or doubled separator).
    #[error("channel `{0}` contains an empty segment")]
    EmptySegment(String),

    /// A multi-level wildcard was used anywhere but the final segment.
    #[error("multi-level wildcard in `{0}` must be the last segment")]
    MisplacedWildcard(String),

    /// Wildcards are only meaningful when subscribing.
    #[error("cannot publish to wildcard channel `{0}`")]
    WildcardPublish(String),

    /// The payload is larger than the configured limit.
    #[error("payload of {size} bytes exceeds the limit of {limit} bytes")]
    PayloadTooLarge {
        /// Size of the rejected payload.
        size: usize,
        /// Configured maximum payload size.
        limit: usize,
    },

    /// The QoS level could not be parsed.
    #[error("unknown QoS level `{0}`")]
    UnknownQoS(String),
}

/// The transport to the broker could not be established.
///
/// Callers are expected to fall back to simulation rather than retry.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The broker could not be reached.
    #[error("broker unreachable: {0}")]
    Unreachable(String),

    /// The broker refused the connection (credentials, authorization).
    #[error("broker rejected connection: {0}")]
    Rejected(String),

    /// No connection was established within the connect timeout.
    #[error("connection attempt timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure of the transport while an operation was in progress.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The handle was closed before or during the operation.
    #[error("transport handle is closed")]
    Closed,

    /// The connection dropped.
    #[error("connection lost: {0}")]
    Disconnected(String),

    /// The message could not be handed to the broker.
    #[error("send failed: {0}")]
    Send(String),

    /// The broker answered the acknowledgement with a failure.
    #[error("acknowledgement failed: {0}")]
    Ack(String),

    /// Opening, confirming or releasing a stream failed.
    #[error("stream failure: {0}")]
    Stream(String),
}

/// Errors returned by the publish operation.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The channel or payload was rejected before any I/O.
    #[error(transparent)]
    InvalidArgument(#[from] ArgumentError),

    /// An at-least-once publish was not confirmed in time. Delivery status is unknown.
    #[error("no acknowledgement for `{channel}` within {timeout:?}")]
    AckTimeout {
        /// Channel the message was sent to.
        channel: String,
        /// The deadline that expired.
        timeout: Duration,
    },

    /// The transport failed mid-operation.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors returned when establishing a subscription.
#[derive(Debug, Error)]
pub enum SubscribeError {
    /// The channel pattern was rejected.
    #[error(transparent)]
    InvalidArgument(#[from] ArgumentError),

    /// The broker did not confirm the subscription within the setup timeout.
    #[error("subscription to `{pattern}` not confirmed within {timeout:?}")]
    Timeout {
        /// The requested pattern.
        pattern: String,
        /// The setup deadline that expired.
        timeout: Duration,
    },

    /// The broker refused or failed the subscribe handshake.
    #[error("subscription to `{pattern}` failed: {source}")]
    Handshake {
        /// The requested pattern.
        pattern: String,
        /// Underlying transport failure.
        source: TransportError,
    },

    /// The stream could not be opened.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Fault raised on an established stream.
///
/// Delivered to [`crate::SubscriptionHandler::on_stream_error`], never returned
/// synchronously.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StreamError {
    /// The connection to the broker was interrupted.
    #[error("connection interrupted: {0}")]
    Interrupted(String),

    /// The listener fell behind and events were dropped.
    #[error("listener lagged, {0} events dropped")]
    Lagged(u64),

    /// The broker reported an error for the stream.
    #[error("broker error: {0}")]
    Broker(String),
}
