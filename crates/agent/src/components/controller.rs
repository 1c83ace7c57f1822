use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use edgelink_messaging::{Channel, MessagingClient, QoS, SubscriptionHandler, Transport};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::Error;
use crate::payload::{Command, Telemetry};

/// Command answered with status telemetry.
pub const GET_STATUS: &str = "get_status";

/// Handles cloud commands for one device.
#[derive(Debug)]
pub struct DeviceController<T>
where
    T: Transport,
{
    client: MessagingClient<T>,
}

impl<T> DeviceController<T>
where
    T: Transport,
{
    /// Creates a controller replying through `client`.
    pub const fn new(client: MessagingClient<T>) -> Self {
        Self { client }
    }

    fn status() -> &'static str {
        "online"
    }
}

#[async_trait]
impl<T> SubscriptionHandler for DeviceController<T>
where
    T: Transport,
{
    type Error = Error;

    async fn on_message(&self, channel: Channel, payload: Bytes) -> Result<(), Error> {
        let command: Command = serde_json::from_slice(&payload)?;
        info!(%channel, command = %command.command, "command received");

        if command.command != GET_STATUS {
            debug!(command = %command.command, "ignoring unknown command");
            return Ok(());
        }

        let telemetry = Telemetry {
            device_id: command.device_id,
            status: Self::status().to_string(),
            timestamp: Utc::now(),
        };
        let reply = format!("telemetry/{}", telemetry.device_id);
        let ack = self
            .client
            .publish(&reply, serde_json::to_vec(&telemetry)?, QoS::AtLeastOnce, None)
            .await?;
        info!(channel = %reply, status = ?ack.status, "telemetry sent");
        Ok(())
    }
}

/// Answers commands on `commands/<device_id>` until `shutdown` fires.
///
/// # Errors
///
/// Returns the subscribe error if the command channel cannot be subscribed to.
pub async fn run<T>(
    client: &MessagingClient<T>,
    device_id: &str,
    shutdown: CancellationToken,
) -> Result<(), Error>
where
    T: Transport,
{
    let channel = format!("commands/{device_id}");
    info!(%channel, simulated = client.is_simulated(), "controller starting");

    let subscription = client
        .subscribe(&channel, DeviceController::new(client.clone()))
        .await?;
    info!(%channel, "waiting for commands");

    shutdown.cancelled().await;
    subscription.close().await;
    info!("controller stopping");
    Ok(())
}
