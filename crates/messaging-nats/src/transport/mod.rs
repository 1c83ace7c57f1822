use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_nats::connection::State;
use async_nats::{Client, ConnectErrorKind, ConnectOptions, Event};
use async_trait::async_trait;
use edgelink_messaging::{
    Channel, ConnectionError, Connector, Delivery, Message, QoS, StreamError, Transport,
    TransportError,
};
use futures::FutureExt;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::stream::NatsStream;
use crate::subject::to_subject;

/// Options for [`NatsConnector`].
#[derive(Clone, Debug)]
pub struct NatsConnectorOptions {
    /// Server URL, e.g. `nats://127.0.0.1:4222`.
    pub url: String,

    /// Connection name reported to the server.
    pub name: Option<String>,

    /// Upper bound on establishing the connection.
    pub connect_timeout: Duration,

    /// Connection events buffered per stream.
    pub event_capacity: usize,
}

impl Default for NatsConnectorOptions {
    fn default() -> Self {
        Self {
            url: "nats://127.0.0.1:4222".to_string(),
            name: None,
            connect_timeout: Duration::from_secs(5),
            event_capacity: 64,
        }
    }
}

/// Connects to a NATS server.
#[derive(Clone, Debug)]
pub struct NatsConnector {
    options: NatsConnectorOptions,
}

impl NatsConnector {
    /// Creates a connector.
    #[must_use]
    pub const fn new(options: NatsConnectorOptions) -> Self {
        Self { options }
    }
}

/// Translates a client event into the fault streams should see, if any.
fn stream_error(event: &Event) -> Option<StreamError> {
    match event {
        Event::Disconnected => {
            warn!("disconnected from nats server");
            Some(StreamError::Interrupted(
                "disconnected from nats server".to_string(),
            ))
        }
        Event::SlowConsumer(sid) => {
            warn!(sid, "nats slow consumer");
            Some(StreamError::Broker(format!(
                "slow consumer on subscription {sid}"
            )))
        }
        Event::ServerError(e) => {
            warn!(error = %e, "nats server error");
            Some(StreamError::Broker(e.to_string()))
        }
        Event::ClientError(e) => {
            warn!(error = %e, "nats client error");
            Some(StreamError::Broker(e.to_string()))
        }
        Event::Connected => {
            info!("connected to nats server");
            None
        }
        other => {
            debug!(event = %other, "nats event");
            None
        }
    }
}

#[async_trait]
impl Connector for NatsConnector {
    type Transport = NatsTransport;

    async fn connect(&self) -> Result<NatsTransport, ConnectionError> {
        let (events, _) = broadcast::channel(self.options.event_capacity.max(1));

        let callback_events = events.clone();
        let mut connect_options = ConnectOptions::new()
            .connection_timeout(self.options.connect_timeout)
            .event_callback(move |event| {
                let events = callback_events.clone();
                async move {
                    if let Some(error) = stream_error(&event) {
                        // No open streams is not an error.
                        let _ = events.send(error);
                    }
                }
            });
        if let Some(name) = &self.options.name {
            connect_options = connect_options.name(name);
        }

        let client = tokio::time::timeout(
            self.options.connect_timeout,
            connect_options.connect(self.options.url.as_str()),
        )
        .await
        .map_err(|_| ConnectionError::Timeout(self.options.connect_timeout))?
        .map_err(|e| match e.kind() {
            ConnectErrorKind::Authentication | ConnectErrorKind::AuthorizationViolation => {
                ConnectionError::Rejected(e.to_string())
            }
            ConnectErrorKind::TimedOut => ConnectionError::Timeout(self.options.connect_timeout),
            _ => ConnectionError::Unreachable(e.to_string()),
        })?;

        info!(url = %self.options.url, "nats connection established");

        Ok(NatsTransport {
            client,
            events,
            closed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        })
    }
}

/// A connection to a NATS server.
#[derive(Debug)]
pub struct NatsTransport {
    client: Client,
    events: broadcast::Sender<StreamError>,
    closed: AtomicBool,
    shutdown: CancellationToken,
}

impl NatsTransport {
    /// The underlying client.
    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Transport for NatsTransport {
    type Stream = NatsStream;

    async fn send(&self, message: Message, qos: QoS) -> Result<Delivery, TransportError> {
        let subject = to_subject(message.channel())?;
        let (_, payload) = message.into_parts();

        self.client
            .publish(subject, payload)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;

        if !qos.requires_ack() {
            return Ok(Delivery::HandedOff);
        }

        // Core NATS has no per-message ack; a flush round-trip confirms the
        // server has everything sent so far.
        let client = self.client.clone();
        Ok(Delivery::Pending(
            async move {
                client
                    .flush()
                    .await
                    .map_err(|e| TransportError::Ack(e.to_string()))
            }
            .boxed(),
        ))
    }

    async fn open_stream(&self, pattern: &Channel) -> Result<NatsStream, TransportError> {
        let subject = to_subject(pattern).map_err(|e| TransportError::Stream(e.to_string()))?;
        let subscriber = self
            .client
            .subscribe(subject)
            .await
            .map_err(|e| TransportError::Stream(e.to_string()))?;

        Ok(NatsStream::new(
            pattern.clone(),
            self.client.clone(),
            subscriber,
            self.events.subscribe(),
            self.shutdown.clone(),
        ))
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::Release);
        self.shutdown.cancel();
        // Flushes pending publishes, then shuts the connection task down.
        self.client
            .drain()
            .await
            .map_err(|e| TransportError::Disconnected(e.to_string()))?;
        info!("nats connection drained");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && self.client.connection_state() == State::Connected
    }
}
