use std::time::Duration;

use edgelink_messaging::{Ack, MessagingClient, QoS, Transport};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::publisher::{settle, ticker};
use crate::Error;
use crate::payload::{CloudReading, TEMPERATURE};

/// Settings for the cloud telemetry publisher.
#[derive(Clone, Debug)]
pub struct CloudPublisherConfig {
    /// Cloud-facing channel readings are published to.
    pub channel: String,

    /// Time between readings.
    pub interval: Duration,

    /// `deviceId` stamped on each reading.
    pub device_id: String,

    /// `sensorType` stamped on each reading.
    pub sensor_type: String,

    /// Lower bound of synthesized values.
    pub min_value: f64,

    /// Upper bound of synthesized values.
    pub max_value: f64,

    /// QoS for each publish.
    pub qos: QoS,
}

impl Default for CloudPublisherConfig {
    fn default() -> Self {
        Self {
            channel: "sensor/data".to_string(),
            interval: Duration::from_secs(30),
            device_id: "sensor-001".to_string(),
            sensor_type: TEMPERATURE.to_string(),
            min_value: 20.0,
            max_value: 30.0,
            qos: QoS::AtLeastOnce,
        }
    }
}

/// Publishes one synthesized cloud reading.
///
/// # Errors
///
/// Returns the publish error, or a JSON error if the reading cannot be encoded.
pub async fn publish_reading<T>(
    client: &MessagingClient<T>,
    config: &CloudPublisherConfig,
) -> Result<Ack, Error>
where
    T: Transport,
{
    let reading = CloudReading::generate(
        &mut rand::thread_rng(),
        &config.device_id,
        &config.sensor_type,
        config.min_value,
        config.max_value,
    );
    let payload = serde_json::to_vec(&reading)?;

    let ack = client
        .publish(&config.channel, payload, config.qos, None)
        .await?;
    info!(
        channel = %config.channel,
        value = reading.value,
        unit = %reading.unit,
        status = ?ack.status,
        "cloud reading published"
    );
    Ok(ack)
}

/// Publishes cloud readings every `config.interval` until `shutdown` fires.
///
/// # Errors
///
/// Returns the first argument or encoding error.
pub async fn run<T>(
    client: &MessagingClient<T>,
    config: &CloudPublisherConfig,
    shutdown: CancellationToken,
) -> Result<u64, Error>
where
    T: Transport,
{
    info!(?config, simulated = client.is_simulated(), "cloud publisher starting");

    let mut ticker = ticker(config.interval);
    let mut published = 0;

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if settle(&config.channel, publish_reading(client, config).await)? {
            published += 1;
        }
    }

    info!(published, "cloud publisher stopping");
    Ok(published)
}
