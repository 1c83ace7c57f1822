//! Publish behavior against the in-memory broker.

use std::convert::Infallible;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use bytes::Bytes;
use edgelink_messaging::{
    ArgumentError, Channel, DeliveryStatus, MessagingClient, MessagingOptions, PublishError, QoS,
    SimulatedAction, SubscriptionHandler, TransportError,
};
use edgelink_messaging_memory::{
    AckBehavior, MemoryBroker, MemoryBrokerOptions, MemoryTransport,
};
use tokio::time::Instant;
use tracing_test::traced_test;

async fn connect(broker: &MemoryBroker) -> MessagingClient<MemoryTransport> {
    MessagingClient::connect(&broker.connector(), MessagingOptions::default())
        .await
        .unwrap()
}

struct Ignore;

#[async_trait]
impl SubscriptionHandler for Ignore {
    type Error = Infallible;

    async fn on_message(&self, _channel: Channel, _payload: Bytes) -> Result<(), Infallible> {
        Ok(())
    }
}

#[tokio::test]
async fn test_at_least_once_confirmed_before_timeout() {
    let broker = MemoryBroker::default();
    let client = connect(&broker).await;

    let started = Instant::now();
    let ack = client
        .publish(
            "local/sensor/data",
            r#"{"temperature":21.5}"#,
            QoS::AtLeastOnce,
            Some(Duration::from_secs(1)),
        )
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(ack.is_confirmed());
    assert_eq!(ack.qos, QoS::AtLeastOnce);

    let published = broker.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].channel().as_str(), "local/sensor/data");
}

#[tokio::test(start_paused = true)]
async fn test_never_acked_times_out_at_deadline() {
    let broker = MemoryBroker::new(MemoryBrokerOptions {
        ack: AckBehavior::Never,
        ..MemoryBrokerOptions::default()
    });
    let client = connect(&broker).await;

    let started = Instant::now();
    let result = client
        .publish(
            "local/sensor/data",
            "{}",
            QoS::AtLeastOnce,
            Some(Duration::from_secs(10)),
        )
        .await;

    assert_matches!(
        result,
        Err(PublishError::AckTimeout { ref channel, timeout })
            if channel == "local/sensor/data" && timeout == Duration::from_secs(10)
    );
    assert!(started.elapsed() >= Duration::from_secs(10));

    // The message was still handed over; only the wait was abandoned.
    assert_eq!(broker.published().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_delayed_ack_within_deadline() {
    let broker = MemoryBroker::new(MemoryBrokerOptions {
        ack: AckBehavior::Delayed(Duration::from_secs(2)),
        ..MemoryBrokerOptions::default()
    });
    let client = connect(&broker).await;

    let started = Instant::now();
    let ack = client
        .publish(
            "telemetry/device1",
            "{}",
            QoS::AtLeastOnce,
            Some(Duration::from_secs(5)),
        )
        .await
        .unwrap();

    assert_eq!(ack.status, DeliveryStatus::Confirmed);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(2));
    assert!(elapsed < Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_at_most_once_does_not_wait() {
    let broker = MemoryBroker::new(MemoryBrokerOptions {
        ack: AckBehavior::Never,
        ..MemoryBrokerOptions::default()
    });
    let client = connect(&broker).await;

    let started = Instant::now();
    let ack = client
        .publish("local/sensor/data", "{}", QoS::AtMostOnce, None)
        .await
        .unwrap();

    assert_eq!(ack.status, DeliveryStatus::Unconfirmed);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test]
async fn test_invalid_arguments_never_reach_broker() {
    let broker = MemoryBroker::default();
    let client = connect(&broker).await;

    assert_matches!(
        client.publish_with_defaults("", "{}").await,
        Err(PublishError::InvalidArgument(ArgumentError::EmptyChannel))
    );
    assert_matches!(
        client.publish_with_defaults("local/alerts/*", "{}").await,
        Err(PublishError::InvalidArgument(ArgumentError::WildcardPublish(_)))
    );
    let oversized = vec![0_u8; client.options().max_payload_size + 1];
    assert_matches!(
        client.publish_with_defaults("local/data", oversized).await,
        Err(PublishError::InvalidArgument(ArgumentError::PayloadTooLarge { .. }))
    );

    assert!(broker.published().is_empty());
}

#[tokio::test]
async fn test_concurrent_publishes_arrive_intact() {
    let broker = MemoryBroker::default();
    let client = connect(&broker).await;

    let mut tasks = Vec::new();
    for i in 0..50 {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            client
                .publish(format!("devices/{i}"), format!("payload-{i}"), QoS::AtLeastOnce, None)
                .await
        }));
    }
    for task in tasks {
        assert!(task.await.unwrap().unwrap().is_confirmed());
    }

    let published = broker.published();
    assert_eq!(published.len(), 50);
    for message in published {
        let index = message.channel().as_str().trim_start_matches("devices/");
        assert_eq!(message.payload(), &Bytes::from(format!("payload-{index}")));
    }
}

#[tokio::test]
async fn test_publish_after_disconnect_is_transport_error() {
    let broker = MemoryBroker::default();
    let client = connect(&broker).await;
    assert!(client.is_alive());

    broker.disconnect_all();

    assert!(!client.is_alive());
    assert_matches!(
        client.publish_with_defaults("local/data", "{}").await,
        Err(PublishError::Transport(TransportError::Disconnected(_)))
    );
}

#[tokio::test]
async fn test_publish_after_close_is_rejected() {
    let broker = MemoryBroker::default();
    let client = connect(&broker).await;

    client.close().await.unwrap();
    client.close().await.unwrap();

    assert_eq!(broker.connection_count(), 0);
    assert_matches!(
        client.publish_with_defaults("local/data", "{}").await,
        Err(PublishError::Transport(TransportError::Closed))
    );
}

#[tokio::test]
async fn test_dropped_client_leaves_broker() {
    let broker = MemoryBroker::default();
    let kept = connect(&broker).await;
    let dropped = connect(&broker).await;
    assert_eq!(broker.connection_count(), 2);

    drop(dropped);

    assert_eq!(broker.connection_count(), 1);
    assert!(kept.is_alive());
}

#[tokio::test]
#[traced_test]
async fn test_unavailable_broker_falls_back_to_simulation() {
    let broker = MemoryBroker::default();
    broker.set_available(false);

    let client =
        MessagingClient::connect_or_simulate(&broker.connector(), MessagingOptions::default())
            .await;
    assert!(client.is_simulated());
    assert!(logs_contain("running in simulation mode"));

    let ack = client
        .publish("local/sensor/data", "{\"t\":1}", QoS::AtLeastOnce, None)
        .await
        .unwrap();
    assert_eq!(ack.status, DeliveryStatus::Simulated);
    assert!(logs_contain("[SIMULATION] would publish"));

    let subscription = client.subscribe("local/alerts/*", Ignore).await.unwrap();
    assert!(subscription.is_simulated());

    // The broker saw nothing; the recorder saw everything.
    assert!(broker.published().is_empty());
    assert_eq!(broker.stream_count(), 0);
    let actions = client.recorder().unwrap().actions();
    assert_eq!(actions.len(), 2);
    assert_matches!(&actions[0], SimulatedAction::Publish { qos: QoS::AtLeastOnce, .. });
    assert_matches!(
        &actions[1],
        SimulatedAction::Subscribe { pattern } if pattern.as_str() == "local/alerts/*"
    );
}
