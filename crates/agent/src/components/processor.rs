use async_trait::async_trait;
use bytes::Bytes;
use edgelink_messaging::{Channel, MessagingClient, SubscriptionHandler, Transport};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::Error;
use crate::payload::{AlertKind, TemperatureAlert, TemperatureSample};

/// Settings for the local temperature processor.
#[derive(Clone, Debug)]
pub struct ProcessorConfig {
    /// Channel carrying temperature samples.
    pub input_channel: String,

    /// Channel alerts are forwarded to.
    pub alert_channel: String,

    /// Samples above this temperature (°F) raise an alert.
    pub threshold: f64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            input_channel: "sensors/temperature".to_string(),
            alert_channel: "component/alerts".to_string(),
            threshold: 80.0,
        }
    }
}

/// Forwards hot temperature samples as alerts.
#[derive(Debug)]
pub struct TemperatureProcessor<T>
where
    T: Transport,
{
    client: MessagingClient<T>,
    alert_channel: String,
    threshold: f64,
}

impl<T> TemperatureProcessor<T>
where
    T: Transport,
{
    /// Creates a processor publishing through `client`.
    pub fn new(client: MessagingClient<T>, config: &ProcessorConfig) -> Self {
        Self {
            client,
            alert_channel: config.alert_channel.clone(),
            threshold: config.threshold,
        }
    }
}

#[async_trait]
impl<T> SubscriptionHandler for TemperatureProcessor<T>
where
    T: Transport,
{
    type Error = Error;

    async fn on_message(&self, _channel: Channel, payload: Bytes) -> Result<(), Error> {
        let sample: TemperatureSample = serde_json::from_slice(&payload)?;
        info!(sensor_id = %sample.sensor_id, temperature = sample.temperature, "sample received");

        if sample.temperature <= self.threshold {
            return Ok(());
        }

        let alert = TemperatureAlert {
            sensor_id: sample.sensor_id,
            temperature: sample.temperature,
            alert: AlertKind::HighTemperature,
        };
        self.client
            .publish_with_defaults(&self.alert_channel, serde_json::to_vec(&alert)?)
            .await?;
        info!(sensor_id = %alert.sensor_id, channel = %self.alert_channel, "alert forwarded");
        Ok(())
    }
}

/// Processes samples until `shutdown` fires.
///
/// # Errors
///
/// Returns the subscribe error if the input channel cannot be subscribed to.
pub async fn run<T>(
    client: &MessagingClient<T>,
    config: &ProcessorConfig,
    shutdown: CancellationToken,
) -> Result<(), Error>
where
    T: Transport,
{
    info!(?config, simulated = client.is_simulated(), "processor starting");

    let processor = TemperatureProcessor::new(client.clone(), config);
    let subscription = client.subscribe(&config.input_channel, processor).await?;
    info!(channel = %config.input_channel, "waiting for sensor data");

    shutdown.cancelled().await;
    subscription.close().await;
    info!("processor stopping");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use edgelink_messaging::MessagingOptions;
    use edgelink_messaging_memory::MemoryBroker;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_forwards_only_hot_samples() {
        let broker = MemoryBroker::default();
        let client = MessagingClient::connect(&broker.connector(), MessagingOptions::default())
            .await
            .unwrap();
        let config = ProcessorConfig::default();
        let shutdown = CancellationToken::new();

        let task = {
            let client = client.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { run(&client, &config, shutdown).await })
        };
        while broker.stream_count() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        broker
            .inject_message("sensors/temperature", r#"{"sensor_id":"t-1","temperature":72.0}"#)
            .unwrap();
        broker
            .inject_message("sensors/temperature", "garbage")
            .unwrap();
        broker
            .inject_message("sensors/temperature", r#"{"sensor_id":"t-2","temperature":85.5}"#)
            .unwrap();

        let alerts = timeout(Duration::from_secs(1), async {
            loop {
                let published = broker.published();
                if !published.is_empty() {
                    return published;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        shutdown.cancel();
        task.await.unwrap().unwrap();

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].channel().as_str(), "component/alerts");
        let alert: TemperatureAlert = serde_json::from_slice(alerts[0].payload()).unwrap();
        assert_eq!(alert.sensor_id, "t-2");
        assert_eq!(alert.alert, AlertKind::HighTemperature);
        assert_eq!(broker.published().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_sample_is_error() {
        let broker = MemoryBroker::default();
        let client = MessagingClient::connect(&broker.connector(), MessagingOptions::default())
            .await
            .unwrap();
        let processor = TemperatureProcessor::new(client, &ProcessorConfig::default());

        let result = processor
            .on_message(
                Channel::new("sensors/temperature").unwrap(),
                Bytes::from_static(b"{}"),
            )
            .await;
        assert!(matches!(result, Err(Error::Json(_))));
    }
}
