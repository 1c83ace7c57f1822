use std::error::Error;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::channel::Channel;
use crate::error::StreamError;

/// Callbacks invoked by a subscription's listener.
///
/// Calls for one subscription never overlap and arrive in the order the
/// transport produced them.
#[async_trait]
pub trait SubscriptionHandler: Send + Sync + 'static {
    /// The error type for message handling.
    type Error: Error + Send + Sync + 'static;

    /// Handles one inbound message. Errors are logged; the stream stays open.
    async fn on_message(&self, channel: Channel, payload: Bytes) -> Result<(), Self::Error>;

    /// Decides whether the stream survives `error`. Returning `false` closes the
    /// subscription.
    async fn on_stream_error(&self, _error: StreamError) -> bool {
        true
    }

    /// Called once when the subscription reaches the closed state.
    async fn on_stream_closed(&self) {}
}

#[async_trait]
impl<X> SubscriptionHandler for Arc<X>
where
    X: SubscriptionHandler,
{
    type Error = X::Error;

    async fn on_message(&self, channel: Channel, payload: Bytes) -> Result<(), Self::Error> {
        self.as_ref().on_message(channel, payload).await
    }

    async fn on_stream_error(&self, error: StreamError) -> bool {
        self.as_ref().on_stream_error(error).await
    }

    async fn on_stream_closed(&self) {
        self.as_ref().on_stream_closed().await;
    }
}
