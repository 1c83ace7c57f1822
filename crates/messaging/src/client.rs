use std::time::Duration;

use bytes::Bytes;
use tracing::{info, warn};

use crate::channel::Channel;
use crate::error::{ConnectionError, PublishError, SubscribeError, TransportError};
use crate::handle::TransportHandle;
use crate::handler::SubscriptionHandler;
use crate::message::Ack;
use crate::publish::{DEFAULT_MAX_PAYLOAD_SIZE, publish, publish_simulated};
use crate::qos::QoS;
use crate::simulation::{SimulatedAction, SimulationRecorder};
use crate::subscription::{Subscription, SubscriptionOptions, subscribe};
use crate::transport::{Connector, Transport};

/// Options for [`MessagingClient`].
#[derive(Clone, Debug)]
pub struct MessagingOptions {
    /// QoS used by [`MessagingClient::publish_with_defaults`].
    pub default_qos: QoS,

    /// How long an at-least-once publish waits for its acknowledgement.
    pub ack_timeout: Duration,

    /// Largest payload accepted by publish.
    pub max_payload_size: usize,

    /// Setup and teardown timeouts for subscriptions.
    pub subscription: SubscriptionOptions,

    /// Skip connecting and run in simulation mode from the start.
    pub simulate: bool,
}

impl Default for MessagingOptions {
    fn default() -> Self {
        Self {
            default_qos: QoS::default(),
            ack_timeout: Duration::from_secs(10),
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            subscription: SubscriptionOptions::default(),
            simulate: false,
        }
    }
}

#[derive(Debug)]
enum Mode<T>
where
    T: Transport,
{
    Live(TransportHandle<T>),
    Simulated(SimulationRecorder),
}

impl<T> Clone for Mode<T>
where
    T: Transport,
{
    fn clone(&self) -> Self {
        match self {
            Self::Live(handle) => Self::Live(handle.clone()),
            Self::Simulated(recorder) => Self::Simulated(recorder.clone()),
        }
    }
}

/// Publishes and subscribes over one transport handle, or records what it
/// would have done when no broker is available.
///
/// The mode is fixed at construction. Call sites behave the same in both modes:
/// arguments are validated and results have the same shape. Simulated publishes
/// report [`DeliveryStatus::Simulated`](crate::DeliveryStatus::Simulated) and
/// simulated subscriptions never deliver.
///
/// Clones share the connection and the recorder.
#[derive(Debug)]
pub struct MessagingClient<T>
where
    T: Transport,
{
    mode: Mode<T>,
    options: MessagingOptions,
}

impl<T> Clone for MessagingClient<T>
where
    T: Transport,
{
    fn clone(&self) -> Self {
        Self {
            mode: self.mode.clone(),
            options: self.options.clone(),
        }
    }
}

impl<T> MessagingClient<T>
where
    T: Transport,
{
    /// Connects through `connector`.
    ///
    /// # Errors
    ///
    /// Returns the [`ConnectionError`] if the broker cannot be reached.
    pub async fn connect<C>(
        connector: &C,
        options: MessagingOptions,
    ) -> Result<Self, ConnectionError>
    where
        C: Connector<Transport = T>,
    {
        let handle = TransportHandle::connect(connector).await?;
        Ok(Self::with_handle(handle, options))
    }

    /// Connects through `connector`, falling back to simulation mode if the
    /// broker is unavailable or `options.simulate` is set.
    pub async fn connect_or_simulate<C>(connector: &C, options: MessagingOptions) -> Self
    where
        C: Connector<Transport = T>,
    {
        if options.simulate {
            info!("simulation mode requested; not connecting");
            return Self::simulated(SimulationRecorder::new(), options);
        }

        match TransportHandle::connect(connector).await {
            Ok(handle) => Self::with_handle(handle, options),
            Err(e) => {
                warn!(error = %e, "broker unavailable; running in simulation mode");
                Self::simulated(SimulationRecorder::new(), options)
            }
        }
    }

    /// Uses an existing handle. The client closes it on [`MessagingClient::close`].
    pub const fn with_handle(handle: TransportHandle<T>, options: MessagingOptions) -> Self {
        Self {
            mode: Mode::Live(handle),
            options,
        }
    }

    /// Creates a client in simulation mode that logs into `recorder`.
    pub const fn simulated(recorder: SimulationRecorder, options: MessagingOptions) -> Self {
        Self {
            mode: Mode::Simulated(recorder),
            options,
        }
    }

    /// Whether the client is in simulation mode.
    #[must_use]
    pub const fn is_simulated(&self) -> bool {
        matches!(self.mode, Mode::Simulated(_))
    }

    /// The recorder, in simulation mode.
    #[must_use]
    pub const fn recorder(&self) -> Option<&SimulationRecorder> {
        match &self.mode {
            Mode::Simulated(recorder) => Some(recorder),
            Mode::Live(_) => None,
        }
    }

    /// The transport handle, when connected.
    #[must_use]
    pub const fn handle(&self) -> Option<&TransportHandle<T>> {
        match &self.mode {
            Mode::Live(handle) => Some(handle),
            Mode::Simulated(_) => None,
        }
    }

    /// Client options.
    #[must_use]
    pub const fn options(&self) -> &MessagingOptions {
        &self.options
    }

    /// Whether the connection is usable. Always true in simulation mode.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        match &self.mode {
            Mode::Live(handle) => handle.is_alive(),
            Mode::Simulated(_) => true,
        }
    }

    /// Publishes `payload` to `channel`.
    ///
    /// `ack_timeout` overrides the configured acknowledgement timeout.
    ///
    /// # Errors
    ///
    /// See [`publish`](crate::publish).
    pub async fn publish(
        &self,
        channel: impl AsRef<str> + Send,
        payload: impl Into<Bytes> + Send,
        qos: QoS,
        ack_timeout: Option<Duration>,
    ) -> Result<Ack, PublishError> {
        let payload = payload.into();
        match &self.mode {
            Mode::Live(handle) => {
                publish(
                    handle,
                    channel.as_ref(),
                    payload,
                    qos,
                    ack_timeout.unwrap_or(self.options.ack_timeout),
                    self.options.max_payload_size,
                )
                .await
            }
            Mode::Simulated(recorder) => publish_simulated(
                recorder,
                channel.as_ref(),
                payload,
                qos,
                self.options.max_payload_size,
            ),
        }
    }

    /// Publishes with the configured QoS and acknowledgement timeout.
    ///
    /// # Errors
    ///
    /// See [`publish`](crate::publish).
    pub async fn publish_with_defaults(
        &self,
        channel: impl AsRef<str> + Send,
        payload: impl Into<Bytes> + Send,
    ) -> Result<Ack, PublishError> {
        self.publish(channel, payload, self.options.default_qos, None)
            .await
    }

    /// Subscribes `handler` to every channel matching `pattern`.
    ///
    /// # Errors
    ///
    /// See [`subscribe`](crate::subscribe). Invalid patterns are rejected in
    /// simulation mode too.
    pub async fn subscribe<X>(
        &self,
        pattern: impl AsRef<str> + Send,
        handler: X,
    ) -> Result<Subscription, SubscribeError>
    where
        X: SubscriptionHandler,
    {
        let pattern = Channel::new(pattern.as_ref())?;
        match &self.mode {
            Mode::Live(handle) => {
                subscribe(handle, pattern, handler, &self.options.subscription).await
            }
            Mode::Simulated(recorder) => {
                info!(pattern = %pattern, "[SIMULATION] would subscribe");
                recorder.record(SimulatedAction::Subscribe {
                    pattern: pattern.clone(),
                });
                Ok(Subscription::simulated(pattern))
            }
        }
    }

    /// Closes the underlying connection. Streams opened from it end.
    ///
    /// # Errors
    ///
    /// Returns the transport's error from closing the connection.
    pub async fn close(&self) -> Result<(), TransportError> {
        match &self.mode {
            Mode::Live(handle) => handle.close().await,
            Mode::Simulated(_) => Ok(()),
        }
    }
}
