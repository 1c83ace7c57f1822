use edgelink_messaging::{ArgumentError, PublishError, SubscribeError, TransportError};
use thiserror::Error;

/// Errors raised by the device components.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad channel or payload.
    #[error(transparent)]
    Argument(#[from] ArgumentError),

    /// Writing the message log failed.
    #[error("output file error: {0}")]
    Io(#[from] std::io::Error),

    /// A payload could not be encoded or decoded.
    #[error("invalid json payload: {0}")]
    Json(#[from] serde_json::Error),

    /// Publishing failed.
    #[error(transparent)]
    Publish(#[from] PublishError),

    /// Subscribing failed.
    #[error(transparent)]
    Subscribe(#[from] SubscribeError),

    /// Closing the connection failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
