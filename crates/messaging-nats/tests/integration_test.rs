//! Connection behavior without a reachable server.

use std::time::Duration;

use assert_matches::assert_matches;
use edgelink_messaging::{
    ConnectionError, DeliveryStatus, MessagingClient, MessagingOptions, QoS, TransportHandle,
};
use edgelink_messaging_nats::{NatsConnector, NatsConnectorOptions, NatsTransport};
use tracing_test::traced_test;

fn unreachable() -> NatsConnector {
    NatsConnector::new(NatsConnectorOptions {
        url: "nats://127.0.0.1:1".to_string(),
        connect_timeout: Duration::from_secs(2),
        ..NatsConnectorOptions::default()
    })
}

#[tokio::test]
async fn test_unreachable_server_is_connection_error() {
    let result: Result<TransportHandle<NatsTransport>, _> =
        TransportHandle::connect(&unreachable()).await;

    assert_matches!(
        result,
        Err(ConnectionError::Unreachable(_) | ConnectionError::Timeout(_))
    );
}

#[tokio::test]
#[traced_test]
async fn test_unreachable_server_falls_back_to_simulation() {
    let client: MessagingClient<NatsTransport> =
        MessagingClient::connect_or_simulate(&unreachable(), MessagingOptions::default()).await;

    assert!(client.is_simulated());
    assert!(logs_contain("running in simulation mode"));

    let ack = client
        .publish("telemetry/device1", "{}", QoS::AtLeastOnce, None)
        .await
        .unwrap();
    assert_eq!(ack.status, DeliveryStatus::Simulated);
    assert_eq!(client.recorder().unwrap().published().len(), 1);
}
