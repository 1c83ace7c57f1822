use async_nats::{Client, Subscriber};
use async_trait::async_trait;
use edgelink_messaging::{
    Channel, Message, StreamError, StreamEvent, TransportError, TransportStream,
};
use futures::StreamExt;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::subject::from_subject;

/// A NATS subscription feeding one channel pattern.
///
/// Connection-level events raised by the client are surfaced on every open
/// stream as [`StreamEvent::Error`].
#[derive(Debug)]
pub struct NatsStream {
    pattern: Channel,
    client: Client,
    subscriber: Subscriber,
    events: broadcast::Receiver<StreamError>,
    events_open: bool,
    shutdown: CancellationToken,
}

impl NatsStream {
    pub(crate) const fn new(
        pattern: Channel,
        client: Client,
        subscriber: Subscriber,
        events: broadcast::Receiver<StreamError>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            pattern,
            client,
            subscriber,
            events,
            events_open: true,
            shutdown,
        }
    }
}

#[async_trait]
impl TransportStream for NatsStream {
    async fn ready(&mut self) -> Result<(), TransportError> {
        // The server has processed the SUB once a flush round-trip completes.
        self.client
            .flush()
            .await
            .map_err(|e| TransportError::Stream(e.to_string()))
    }

    async fn next_event(&mut self) -> Option<StreamEvent> {
        loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => return None,
                event = self.events.recv(), if self.events_open => match event {
                    Ok(error) => return Some(StreamEvent::Error(error)),
                    Err(RecvError::Lagged(skipped)) => {
                        return Some(StreamEvent::Error(StreamError::Lagged(skipped)));
                    }
                    Err(RecvError::Closed) => self.events_open = false,
                },
                message = self.subscriber.next() => {
                    let Some(message) = message else {
                        return Some(StreamEvent::Closed);
                    };
                    match from_subject(message.subject.as_str()) {
                        Ok(channel) => {
                            let message = Message::new(channel, message.payload);
                            return Some(StreamEvent::Message(message));
                        }
                        Err(e) => warn!(pattern = %self.pattern, error = %e, "dropping message"),
                    }
                }
            }
        }
    }

    async fn release(mut self) -> Result<(), TransportError> {
        debug!(pattern = %self.pattern, "unsubscribing");
        self.subscriber
            .unsubscribe()
            .await
            .map_err(|e| TransportError::Stream(e.to_string()))
    }
}
