use std::time::Duration;

use bytes::Bytes;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::channel::Channel;
use crate::error::{ArgumentError, PublishError, TransportError};
use crate::handle::TransportHandle;
use crate::message::{Ack, DeliveryStatus, Message};
use crate::qos::QoS;
use crate::simulation::{SimulatedAction, SimulationRecorder};
use crate::transport::{Delivery, Transport};

/// Default upper bound on payload size.
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 128 * 1024;

/// Checks a publish before anything is sent.
///
/// # Errors
///
/// Returns an [`ArgumentError`] for empty or wildcard channels and for payloads
/// over `max_payload_size`.
pub fn validate(
    channel: &str,
    payload: &Bytes,
    max_payload_size: usize,
) -> Result<Channel, ArgumentError> {
    let channel = Channel::publishable(channel)?;
    if payload.len() > max_payload_size {
        return Err(ArgumentError::PayloadTooLarge {
            size: payload.len(),
            limit: max_payload_size,
        });
    }
    Ok(channel)
}

/// Publishes one message through `handle`.
///
/// With [`QoS::AtLeastOnce`] the calling task waits up to `ack_timeout` for the
/// broker's acknowledgement. Expiry only abandons the wait; the message may still
/// be delivered. [`QoS::AtMostOnce`] returns as soon as the transport has the
/// message. Nothing is retried.
///
/// # Errors
///
/// - [`PublishError::InvalidArgument`] before any I/O for bad input.
/// - [`PublishError::AckTimeout`] if the acknowledgement does not arrive in time.
/// - [`PublishError::Transport`] if the transport fails or the handle is closed.
pub async fn publish<T>(
    handle: &TransportHandle<T>,
    channel: &str,
    payload: Bytes,
    qos: QoS,
    ack_timeout: Duration,
    max_payload_size: usize,
) -> Result<Ack, PublishError>
where
    T: Transport,
{
    let channel = validate(channel, &payload, max_payload_size)?;
    let size = payload.len();
    let message = Message::new(channel.clone(), payload);

    let delivery = handle.send(message, qos).await.inspect_err(|e| {
        warn!(channel = %channel, error = %e, "publish failed");
    })?;

    let status = match (qos, delivery) {
        (QoS::AtLeastOnce, Delivery::Pending(ack)) => match timeout(ack_timeout, ack).await {
            Ok(Ok(())) => DeliveryStatus::Confirmed,
            Ok(Err(e)) => {
                warn!(channel = %channel, error = %e, "acknowledgement failed");
                return Err(e.into());
            }
            Err(_) => {
                warn!(channel = %channel, timeout = ?ack_timeout, "acknowledgement timed out");
                return Err(PublishError::AckTimeout {
                    channel: channel.to_string(),
                    timeout: ack_timeout,
                });
            }
        },
        (QoS::AtLeastOnce, Delivery::HandedOff) => {
            warn!(channel = %channel, "transport offered no acknowledgement");
            return Err(TransportError::Ack(
                "transport returned no acknowledgement for at-least-once publish".to_string(),
            )
            .into());
        }
        // An ack for an at-most-once publish is never awaited.
        (QoS::AtMostOnce, _) => DeliveryStatus::Unconfirmed,
    };

    match status {
        DeliveryStatus::Confirmed => info!(channel = %channel, bytes = size, %qos, "published"),
        _ => debug!(channel = %channel, bytes = size, %qos, "handed off"),
    }

    Ok(Ack {
        channel,
        qos,
        status,
    })
}

/// Records a publish instead of sending it. Argument validation still applies so
/// call sites see identical behavior in both modes.
pub(crate) fn publish_simulated(
    recorder: &SimulationRecorder,
    channel: &str,
    payload: Bytes,
    qos: QoS,
    max_payload_size: usize,
) -> Result<Ack, PublishError> {
    let channel = validate(channel, &payload, max_payload_size)?;

    info!(
        channel = %channel,
        payload = %String::from_utf8_lossy(&payload),
        "[SIMULATION] would publish"
    );

    recorder.record(SimulatedAction::Publish {
        message: Message::new(channel.clone(), payload),
        qos,
    });

    Ok(Ack {
        channel,
        qos,
        status: DeliveryStatus::Simulated,
    })
}
