use async_trait::async_trait;
use edgelink_messaging::{Channel, StreamError, StreamEvent, TransportError, TransportStream};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::broker::{BrokerEvent, HandshakeBehavior, MemoryBroker};

/// Events for one subscription pattern on a [`MemoryBroker`].
#[derive(Debug)]
pub struct MemoryStream {
    id: Uuid,
    pattern: Channel,
    broker: MemoryBroker,
    receiver: broadcast::Receiver<BrokerEvent>,
    shutdown: CancellationToken,
}

impl MemoryStream {
    pub(crate) fn new(
        broker: MemoryBroker,
        pattern: Channel,
        shutdown: CancellationToken,
    ) -> Self {
        let id = Uuid::new_v4();
        let receiver = broker.open_stream(id, pattern.clone());

        Self {
            id,
            pattern,
            broker,
            receiver,
            shutdown,
        }
    }

    fn filter(&self, event: BrokerEvent) -> Option<StreamEvent> {
        match event {
            BrokerEvent::Message(message) if self.pattern.matches(message.channel()) => {
                Some(StreamEvent::Message(message))
            }
            BrokerEvent::Error { pattern, error } if pattern == self.pattern.as_str() => {
                Some(StreamEvent::Error(error))
            }
            BrokerEvent::Close { pattern } if pattern == self.pattern.as_str() => {
                Some(StreamEvent::Closed)
            }
            BrokerEvent::Disconnect => Some(StreamEvent::Error(StreamError::Interrupted(
                "memory broker dropped the connection".to_string(),
            ))),
            _ => None,
        }
    }
}

#[async_trait]
impl TransportStream for MemoryStream {
    async fn ready(&mut self) -> Result<(), TransportError> {
        match self.broker.handshake_behavior() {
            HandshakeBehavior::Immediate => Ok(()),
            HandshakeBehavior::Never => futures::future::pending().await,
            HandshakeBehavior::Fail => Err(TransportError::Stream(format!(
                "subscription to `{}` refused",
                self.pattern
            ))),
        }
    }

    async fn next_event(&mut self) -> Option<StreamEvent> {
        loop {
            let received = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => return None,
                received = self.receiver.recv() => received,
            };

            match received {
                Ok(event) => {
                    if let Some(event) = self.filter(event) {
                        return Some(event);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    return Some(StreamEvent::Error(StreamError::Lagged(skipped)));
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    async fn release(self) -> Result<(), TransportError> {
        debug!(pattern = %self.pattern, stream = %self.id, "releasing memory stream");
        self.broker.release_stream(self.id);
        Ok(())
    }
}
