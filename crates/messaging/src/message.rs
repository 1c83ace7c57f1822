use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::channel::Channel;
use crate::qos::QoS;

/// An opaque payload addressed to a channel.
///
/// Fields are read-only so a message cannot change after it has been handed to
/// the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    channel: Channel,
    payload: Bytes,
    timestamp: DateTime<Utc>,
}

impl Message {
    /// Creates a message stamped with the current time.
    pub fn new(channel: Channel, payload: impl Into<Bytes>) -> Self {
        Self::with_timestamp(channel, payload, Utc::now())
    }

    /// Creates a message with an explicit send timestamp.
    pub fn with_timestamp(
        channel: Channel,
        payload: impl Into<Bytes>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            channel,
            payload: payload.into(),
            timestamp,
        }
    }

    /// Channel the message is addressed to.
    #[must_use]
    pub const fn channel(&self) -> &Channel {
        &self.channel
    }

    /// The payload bytes.
    #[must_use]
    pub const fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// When the message was created.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Splits the message into channel and payload.
    #[must_use]
    pub fn into_parts(self) -> (Channel, Bytes) {
        (self.channel, self.payload)
    }
}

/// How far a published message is known to have travelled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// The broker acknowledged the message.
    Confirmed,

    /// Handed to the transport without waiting for an acknowledgement.
    Unconfirmed,

    /// Nothing was sent; the client is running in simulation mode.
    Simulated,
}

/// Successful outcome of a publish.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ack {
    /// Channel the message was published to.
    pub channel: Channel,

    /// QoS the message was published with.
    pub qos: QoS,

    /// Delivery status at the time the publish returned.
    pub status: DeliveryStatus,
}

impl Ack {
    /// Whether the broker confirmed receipt.
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        self.status == DeliveryStatus::Confirmed
    }
}
