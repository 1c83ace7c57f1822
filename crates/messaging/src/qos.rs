use std::fmt;
use std::str::FromStr;

use crate::error::ArgumentError;

/// Delivery guarantee requested for a publish.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum QoS {
    /// Fire and forget. The publish returns once the transport has the message.
    AtMostOnce,

    /// The publish waits for the broker to acknowledge the message. Duplicates are
    /// possible if the caller retries after a timeout.
    #[default]
    AtLeastOnce,
}

impl QoS {
    /// Numeric level, as used by MQTT-style brokers.
    #[must_use]
    pub const fn level(self) -> u8 {
        match self {
            Self::AtMostOnce => 0,
            Self::AtLeastOnce => 1,
        }
    }

    /// Whether a publish at this level waits for an acknowledgement.
    #[must_use]
    pub const fn requires_ack(self) -> bool {
        matches!(self, Self::AtLeastOnce)
    }
}

impl TryFrom<u8> for QoS {
    type Error = ArgumentError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            0 => Ok(Self::AtMostOnce),
            1 => Ok(Self::AtLeastOnce),
            other => Err(ArgumentError::UnknownQoS(other.to_string())),
        }
    }
}

impl FromStr for QoS {
    type Err = ArgumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "0" | "at-most-once" => Ok(Self::AtMostOnce),
            "1" | "at-least-once" => Ok(Self::AtLeastOnce),
            _ => Err(ArgumentError::UnknownQoS(s.to_string())),
        }
    }
}

impl fmt::Display for QoS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AtMostOnce => f.write_str("at-most-once"),
            Self::AtLeastOnce => f.write_str("at-least-once"),
        }
    }
}
