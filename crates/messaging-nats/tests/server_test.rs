//! Round trips against a live server. Set `EDGELINK_TEST_NATS_URL` to run them.

use std::convert::Infallible;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use bytes::Bytes;
use edgelink_messaging::{
    Channel, DeliveryStatus, MessagingClient, MessagingOptions, PublishError, QoS,
    SubscriptionHandler, SubscriptionState, TransportError,
};
use edgelink_messaging_nats::{NatsConnector, NatsConnectorOptions, NatsTransport};
use tokio::sync::mpsc;
use tokio::time::timeout;

struct Forward(mpsc::UnboundedSender<(Channel, Bytes)>);

#[async_trait]
impl SubscriptionHandler for Forward {
    type Error = Infallible;

    async fn on_message(&self, channel: Channel, payload: Bytes) -> Result<(), Infallible> {
        let _ = self.0.send((channel, payload));
        Ok(())
    }
}

async fn connect() -> Option<MessagingClient<NatsTransport>> {
    let url = std::env::var("EDGELINK_TEST_NATS_URL").ok()?;
    let connector = NatsConnector::new(NatsConnectorOptions {
        url,
        ..NatsConnectorOptions::default()
    });
    Some(
        MessagingClient::connect(&connector, MessagingOptions::default())
            .await
            .unwrap(),
    )
}

#[tokio::test]
async fn test_publish_subscribe_and_close() {
    let Some(client) = connect().await else {
        return;
    };

    let (sender, mut receiver) = mpsc::unbounded_channel();
    let subscription = client
        .subscribe("edgelink-test/+/status", Forward(sender))
        .await
        .unwrap();

    let ack = client
        .publish("edgelink-test/device1/status", "online", QoS::AtLeastOnce, None)
        .await
        .unwrap();
    assert_eq!(ack.status, DeliveryStatus::Confirmed);

    let (channel, payload) = timeout(Duration::from_secs(5), receiver.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(channel.as_str(), "edgelink-test/device1/status");
    assert_eq!(payload, Bytes::from_static(b"online"));

    client.close().await.unwrap();
    assert!(!client.is_alive());

    let mut changes = subscription.state_changes();
    timeout(
        Duration::from_secs(5),
        changes.wait_for(|state| *state == SubscriptionState::Closed),
    )
    .await
    .unwrap()
    .unwrap();

    assert_matches!(
        client.publish_with_defaults("edgelink-test/device1/status", "x").await,
        Err(PublishError::Transport(TransportError::Closed))
    );
    subscription.close().await;
}
