use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::channel::Channel;
use crate::error::{ConnectionError, TransportError};
use crate::message::Message;
use crate::qos::QoS;
use crate::transport::{Connector, Delivery, Transport};

#[derive(Debug)]
struct Inner<T> {
    transport: T,
    // Sends hold the read side, close takes the write side.
    gate: RwLock<()>,
    closed: AtomicBool,
    // Cancelled on close; aborts sends and opens still in flight.
    shutdown: CancellationToken,
}

/// Shared handle to the one connection a process holds to the broker.
///
/// Clones share the connection. Whoever established it is expected to close it.
#[derive(Debug)]
pub struct TransportHandle<T>
where
    T: Transport,
{
    inner: Arc<Inner<T>>,
}

impl<T> Clone for TransportHandle<T>
where
    T: Transport,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> TransportHandle<T>
where
    T: Transport,
{
    /// Connects through `connector`.
    ///
    /// # Errors
    ///
    /// Returns the connector's [`ConnectionError`] if the broker is unavailable.
    pub async fn connect<C>(connector: &C) -> Result<Self, ConnectionError>
    where
        C: Connector<Transport = T>,
    {
        let transport = connector.connect().await?;
        info!("connected to broker");
        Ok(Self::new(transport))
    }

    /// Wraps an already connected transport.
    pub fn new(transport: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                gate: RwLock::new(()),
                closed: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Whether the handle is open and the connection is usable.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.is_closed() && self.inner.transport.is_connected()
    }

    /// Whether [`TransportHandle::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// The wrapped transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// Hands a message to the transport.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] once the handle is closed, even if the
    /// close races with this call or lands while the transport is still busy.
    pub async fn send(&self, message: Message, qos: QoS) -> Result<Delivery, TransportError> {
        let _gate = self.inner.gate.read().await;
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        tokio::select! {
            () = self.inner.shutdown.cancelled() => Err(TransportError::Closed),
            result = self.inner.transport.send(message, qos) => result,
        }
    }

    /// Opens a transport stream for `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] once the handle is closed, or whatever
    /// the transport reports.
    pub async fn open_stream(&self, pattern: &Channel) -> Result<T::Stream, TransportError> {
        let _gate = self.inner.gate.read().await;
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        tokio::select! {
            () = self.inner.shutdown.cancelled() => Err(TransportError::Closed),
            result = self.inner.transport.open_stream(pattern) => result,
        }
    }

    /// Closes the connection. Only the first call does anything.
    ///
    /// Sends still in flight are abandoned with [`TransportError::Closed`]
    /// before the transport is torn down.
    ///
    /// # Errors
    ///
    /// Returns the transport's error from the first close.
    pub async fn close(&self) -> Result<(), TransportError> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            debug!("transport handle already closed");
            return Ok(());
        }
        self.inner.shutdown.cancel();

        let _gate = self.inner.gate.write().await;
        info!("closing broker connection");
        self.inner.transport.close().await
    }
}
