use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use edgelink_messaging::{Channel, MessagingClient, StreamError, SubscriptionHandler, Transport};
use serde_json::Value;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::Error;
use crate::payload::SENSOR_READING;

/// Settings for the topic subscriber.
#[derive(Clone, Debug)]
pub struct SubscriberConfig {
    /// Channel patterns to subscribe to.
    pub channels: Vec<String>,

    /// Append every message to this file.
    pub output_file: Option<PathBuf>,

    /// Readings above this temperature (°C) raise a warning.
    pub alert_threshold: f64,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            channels: vec!["local/sensor/data".to_string(), "local/alerts/*".to_string()],
            output_file: None,
            alert_threshold: 30.0,
        }
    }
}

/// Logs every message and flags hot sensor readings.
#[derive(Debug)]
pub struct LoggingHandler {
    output_file: Option<PathBuf>,
    alert_threshold: f64,
    // Serializes appends from handlers on different subscriptions.
    write_lock: Mutex<()>,
    received: AtomicU64,
    alerts: AtomicU64,
}

impl LoggingHandler {
    /// Creates a handler from `config`.
    #[must_use]
    pub fn new(config: &SubscriberConfig) -> Self {
        Self {
            output_file: config.output_file.clone(),
            alert_threshold: config.alert_threshold,
            write_lock: Mutex::new(()),
            received: AtomicU64::new(0),
            alerts: AtomicU64::new(0),
        }
    }

    /// Messages handled so far.
    #[must_use]
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// High temperature alerts raised so far.
    #[must_use]
    pub fn alerts(&self) -> u64 {
        self.alerts.load(Ordering::Relaxed)
    }

    async fn append(&self, path: &Path, channel: &Channel, body: &str) -> Result<(), Error> {
        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        let entry = format!(
            "[{}] Topic: {channel}\n{body}\n{}\n",
            Utc::now().to_rfc3339(),
            "-".repeat(50)
        );
        file.write_all(entry.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    fn inspect(&self, channel: &Channel, message: &Value) {
        let message_type = message
            .get("messageType")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        info!(%channel, message_type, "processing message");

        if message_type != SENSOR_READING {
            return;
        }
        let temperature = message
            .pointer("/data/temperature")
            .and_then(Value::as_f64)
            .unwrap_or_default();
        if temperature > self.alert_threshold {
            self.alerts.fetch_add(1, Ordering::Relaxed);
            warn!(%channel, temperature, "high temperature alert");
        }
    }
}

#[async_trait]
impl SubscriptionHandler for LoggingHandler {
    type Error = Error;

    async fn on_message(&self, channel: Channel, payload: Bytes) -> Result<(), Error> {
        self.received.fetch_add(1, Ordering::Relaxed);
        let text = String::from_utf8_lossy(&payload);
        info!(%channel, message = %text, "received message");

        let parsed = serde_json::from_slice::<Value>(&payload).ok();
        let body = match &parsed {
            Some(value) => serde_json::to_string_pretty(value)?,
            None => text.into_owned(),
        };

        if let Some(path) = &self.output_file {
            self.append(path, &channel, &body).await?;
        }
        if let Some(value) = &parsed {
            self.inspect(&channel, value);
        }
        Ok(())
    }

    async fn on_stream_error(&self, error: StreamError) -> bool {
        error!(error = %error, "stream error");
        true
    }

    async fn on_stream_closed(&self) {
        info!("message stream closed");
    }
}

/// Subscribes to every configured channel and logs traffic until `shutdown`
/// fires. A channel that fails to subscribe is logged and skipped.
///
/// # Errors
///
/// Returns an I/O error if the output file's directory cannot be created.
pub async fn run<T>(
    client: &MessagingClient<T>,
    config: &SubscriberConfig,
    shutdown: CancellationToken,
) -> Result<Arc<LoggingHandler>, Error>
where
    T: Transport,
{
    info!(?config, simulated = client.is_simulated(), "subscriber starting");

    if let Some(parent) = config.output_file.as_ref().and_then(|p| p.parent()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let handler = Arc::new(LoggingHandler::new(config));
    let mut subscriptions = Vec::new();
    for channel in &config.channels {
        match client.subscribe(channel.trim(), handler.clone()).await {
            Ok(subscription) => subscriptions.push(subscription),
            Err(e) => error!(channel = %channel, error = %e, "failed to subscribe"),
        }
    }

    info!(subscriptions = subscriptions.len(), "listening for messages");
    shutdown.cancelled().await;

    for subscription in &subscriptions {
        subscription.close().await;
    }
    info!(received = handler.received(), "subscriber stopping");
    Ok(handler)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use edgelink_messaging::{MessagingOptions, QoS};
    use edgelink_messaging_memory::MemoryBroker;

    fn reading(temperature: f64) -> String {
        serde_json::json!({
            "messageType": "sensor-reading",
            "deviceId": "ipc-sensor-001",
            "data": { "temperature": temperature, "humidity": 40.0, "pressure": 1000.0 },
            "status": "active",
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_flags_high_temperature() {
        let handler = LoggingHandler::new(&SubscriberConfig::default());
        let channel = Channel::new("local/sensor/data").unwrap();

        handler
            .on_message(channel.clone(), Bytes::from(reading(25.0)))
            .await
            .unwrap();
        handler
            .on_message(channel.clone(), Bytes::from(reading(31.5)))
            .await
            .unwrap();
        handler
            .on_message(channel, Bytes::from_static(b"not json"))
            .await
            .unwrap();

        assert_eq!(handler.received(), 3);
        assert_eq!(handler.alerts(), 1);
        assert!(handler.on_stream_error(StreamError::Lagged(2)).await);
    }

    #[tokio::test]
    async fn test_appends_to_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("messages.log");
        let config = SubscriberConfig {
            output_file: Some(path.clone()),
            ..SubscriberConfig::default()
        };

        let broker = MemoryBroker::default();
        let client = MessagingClient::connect(&broker.connector(), MessagingOptions::default())
            .await
            .unwrap();
        let shutdown = CancellationToken::new();
        let task = {
            let client = client.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { run(&client, &config, shutdown).await })
        };

        while broker.stream_count() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        client
            .publish("local/alerts/high", "plain text alert", QoS::AtMostOnce, None)
            .await
            .unwrap();
        client
            .publish("local/sensor/data", reading(20.0), QoS::AtMostOnce, None)
            .await
            .unwrap();

        let contents = tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                let contents = tokio::fs::read_to_string(&path).await.unwrap_or_default();
                if contents.matches("Topic:").count() == 2 {
                    return contents;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        shutdown.cancel();
        let handler = task.await.unwrap().unwrap();
        assert_eq!(handler.received(), 2);
        assert!(contents.contains("Topic: local/alerts/high\nplain text alert\n"));
        assert!(contents.contains("\"deviceId\": \"ipc-sensor-001\""));
        assert_eq!(broker.stream_count(), 0);
    }
}
