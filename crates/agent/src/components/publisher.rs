use std::time::Duration;

use edgelink_messaging::{Ack, MessagingClient, PublishError, QoS, Transport};
use tokio::time::{Interval, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::Error;
use crate::payload::{SENSOR_READING, SensorReading};

/// Settings for the telemetry publisher.
#[derive(Clone, Debug)]
pub struct PublisherConfig {
    /// Channel readings are published to.
    pub channel: String,

    /// Time between readings.
    pub interval: Duration,

    /// `messageType` stamped on each reading.
    pub message_type: String,

    /// `deviceId` stamped on each reading.
    pub device_id: String,

    /// QoS for each publish.
    pub qos: QoS,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            channel: "local/sensor/data".to_string(),
            interval: Duration::from_secs(15),
            message_type: SENSOR_READING.to_string(),
            device_id: "ipc-sensor-001".to_string(),
            qos: QoS::AtLeastOnce,
        }
    }
}

/// Publishes one synthesized reading.
///
/// # Errors
///
/// Returns the publish error, or a JSON error if the reading cannot be encoded.
pub async fn publish_reading<T>(
    client: &MessagingClient<T>,
    config: &PublisherConfig,
    sequence_number: u64,
) -> Result<Ack, Error>
where
    T: Transport,
{
    let reading = SensorReading::generate(
        &mut rand::thread_rng(),
        &config.device_id,
        &config.message_type,
        sequence_number,
    );
    let payload = serde_json::to_vec(&reading)?;

    let ack = client
        .publish(&config.channel, payload, config.qos, None)
        .await?;
    info!(
        channel = %config.channel,
        sequence_number,
        temperature = reading.data.temperature,
        status = ?ack.status,
        "reading published"
    );
    Ok(ack)
}

/// Publishes readings every `config.interval` until `shutdown` fires.
///
/// Timeouts and transport failures are logged and the loop carries on. Invalid
/// arguments end the loop since no later attempt can succeed.
///
/// # Errors
///
/// Returns the first argument or encoding error.
pub async fn run<T>(
    client: &MessagingClient<T>,
    config: &PublisherConfig,
    shutdown: CancellationToken,
) -> Result<u64, Error>
where
    T: Transport,
{
    info!(?config, simulated = client.is_simulated(), "publisher starting");

    let mut ticker = ticker(config.interval);
    let mut published = 0;

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let outcome = publish_reading(client, config, published + 1).await;
        if settle(&config.channel, outcome)? {
            published += 1;
        }
    }

    info!(published, "publisher stopping");
    Ok(published)
}

/// Interval that fires immediately and then every `period`, delaying after a
/// slow publish rather than bursting.
pub(crate) fn ticker(period: Duration) -> Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Sorts a publish outcome for a periodic loop. Returns whether it counts as
/// published.
///
/// Timeouts and transport failures are logged and skipped. Invalid arguments
/// and encoding errors are fatal.
pub(crate) fn settle(channel: &str, outcome: Result<Ack, Error>) -> Result<bool, Error> {
    match outcome {
        Ok(_) => Ok(true),
        Err(Error::Publish(PublishError::InvalidArgument(e))) => Err(e.into()),
        Err(Error::Publish(e)) => {
            warn!(channel, error = %e, "publish failed");
            Ok(false)
        }
        Err(e) => {
            error!(error = %e, "publisher stopping");
            Err(e)
        }
    }
}
