use edgelink_messaging::TransportError;
use thiserror::Error;

/// A channel or subject that cannot be carried over NATS.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The channel has a segment NATS would split or reject.
    #[error("channel `{0}` cannot be expressed as a NATS subject")]
    Unrepresentable(String),

    /// An inbound subject did not map back to a valid channel.
    #[error("subject `{0}` is not a valid channel")]
    InvalidSubject(String),
}

impl From<Error> for TransportError {
    fn from(error: Error) -> Self {
        Self::Send(error.to_string())
    }
}
