use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use edgelink_messaging::{
    AckFuture, Channel, ConnectionError, Connector, Delivery, Message, QoS, Transport,
    TransportError,
};
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::broker::{AckBehavior, MemoryBroker};
use crate::stream::MemoryStream;

/// Connects [`MemoryTransport`]s to a [`MemoryBroker`].
#[derive(Clone, Debug)]
pub struct MemoryConnector {
    broker: MemoryBroker,
}

impl MemoryConnector {
    /// Creates a connector for `broker`.
    #[must_use]
    pub const fn new(broker: MemoryBroker) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    type Transport = MemoryTransport;

    async fn connect(&self) -> Result<MemoryTransport, ConnectionError> {
        if !self.broker.is_available() {
            return Err(ConnectionError::Unreachable(
                "memory broker is unavailable".to_string(),
            ));
        }

        let transport = MemoryTransport::new(self.broker.clone());
        debug!(connection = %transport.id, "memory connection established");
        Ok(transport)
    }
}

/// One client connection to a [`MemoryBroker`].
#[derive(Debug)]
pub struct MemoryTransport {
    id: Uuid,
    broker: MemoryBroker,
    connected: Arc<AtomicBool>,
    shutdown: CancellationToken,
}

impl MemoryTransport {
    fn new(broker: MemoryBroker) -> Self {
        let id = Uuid::new_v4();
        let connected = Arc::new(AtomicBool::new(true));
        broker.register_connection(id, connected.clone());

        Self {
            id,
            broker,
            connected,
            shutdown: CancellationToken::new(),
        }
    }

    fn ack(&self) -> AckFuture {
        match self.broker.ack_behavior() {
            AckBehavior::Immediate => futures::future::ready(Ok(())).boxed(),
            AckBehavior::Delayed(delay) => tokio::time::sleep(delay).map(Ok).boxed(),
            AckBehavior::Never => futures::future::pending().boxed(),
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    type Stream = MemoryStream;

    async fn send(&self, message: Message, qos: QoS) -> Result<Delivery, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Disconnected(
                "memory broker connection lost".to_string(),
            ));
        }

        self.broker.accept(message);

        if qos.requires_ack() {
            Ok(Delivery::Pending(self.ack()))
        } else {
            Ok(Delivery::HandedOff)
        }
    }

    async fn open_stream(&self, pattern: &Channel) -> Result<MemoryStream, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Disconnected(
                "memory broker connection lost".to_string(),
            ));
        }

        Ok(MemoryStream::new(
            self.broker.clone(),
            pattern.clone(),
            self.shutdown.clone(),
        ))
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::Release);
        self.shutdown.cancel();
        self.broker.remove_connection(self.id);
        info!(connection = %self.id, "memory connection closed");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.broker.remove_connection(self.id);
    }
}
