use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::channel::Channel;
use crate::error::SubscribeError;
use crate::handle::TransportHandle;
use crate::handler::SubscriptionHandler;
use crate::transport::{StreamEvent, Transport, TransportStream};

/// Lifecycle of a subscription. `Closed` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Waiting for the broker to confirm the subscription.
    Pending,

    /// Receiving and dispatching messages.
    Active,

    /// A stream error is being handed to the handler.
    Erroring,

    /// No further messages will be dispatched.
    Closed,
}

/// Timeouts governing a subscription's setup and teardown.
#[derive(Clone, Debug)]
pub struct SubscriptionOptions {
    /// How long the broker has to confirm the subscription.
    pub setup_timeout: Duration,

    /// How long `close` waits for an in-flight handler call and stream release.
    pub close_timeout: Duration,
}

impl Default for SubscriptionOptions {
    fn default() -> Self {
        Self {
            setup_timeout: Duration::from_secs(10),
            close_timeout: Duration::from_secs(5),
        }
    }
}

struct Core {
    id: Uuid,
    pattern: Channel,
    state: watch::Sender<SubscriptionState>,
    cancel: CancellationToken,
}

impl Core {
    fn new(pattern: Channel, initial: SubscriptionState) -> Self {
        Self {
            id: Uuid::new_v4(),
            pattern,
            state: watch::Sender::new(initial),
            cancel: CancellationToken::new(),
        }
    }

    fn state(&self) -> SubscriptionState {
        *self.state.borrow()
    }

    /// Moves `from` -> `to`. Returns false if the current state was not `from`
    /// or is `Closed`.
    fn transition(&self, from: SubscriptionState, to: SubscriptionState) -> bool {
        self.state.send_if_modified(|state| {
            if *state == from && *state != SubscriptionState::Closed {
                *state = to;
                true
            } else {
                false
            }
        })
    }

    /// Returns true if this call performed the transition.
    fn mark_closed(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == SubscriptionState::Closed {
                false
            } else {
                *state = SubscriptionState::Closed;
                true
            }
        })
    }
}

/// Handle to a live (or simulated) subscription.
///
/// Owns the background listener. Dropping the handle stops the listener without
/// waiting for it; use [`Subscription::close`] to wait.
pub struct Subscription {
    core: Arc<Core>,
    close_timeout: Duration,
    listener: Mutex<Option<JoinHandle<()>>>,
    simulated: bool,
}

impl Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.core.id)
            .field("pattern", &self.core.pattern)
            .field("state", &self.core.state())
            .field("simulated", &self.simulated)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    /// Creates an inert subscription that never dispatches anything.
    pub(crate) fn simulated(pattern: Channel) -> Self {
        Self {
            core: Arc::new(Core::new(pattern, SubscriptionState::Active)),
            close_timeout: Duration::ZERO,
            listener: Mutex::new(None),
            simulated: true,
        }
    }

    /// Unique id of this subscription.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.core.id
    }

    /// The channel pattern subscribed to.
    #[must_use]
    pub fn pattern(&self) -> &Channel {
        &self.core.pattern
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SubscriptionState {
        self.core.state()
    }

    /// Receiver observing every state transition.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<SubscriptionState> {
        self.core.state.subscribe()
    }

    /// Whether this subscription was created in simulation mode and will never
    /// receive messages.
    #[must_use]
    pub const fn is_simulated(&self) -> bool {
        self.simulated
    }

    /// Stops the subscription.
    ///
    /// The state becomes `Closed` before this waits, so no handler call starts
    /// after it returns. A call already in flight is given `close_timeout` to
    /// finish. Calls after the first are no-ops.
    pub async fn close(&self) {
        if self.core.mark_closed() {
            info!(pattern = %self.core.pattern, id = %self.core.id, "closing subscription");
        }
        self.core.cancel.cancel();

        // Held while joining so concurrent closers also wait for the listener.
        let mut listener = self.listener.lock().await;
        let Some(handle) = listener.take() else {
            return;
        };

        match timeout(self.close_timeout, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(pattern = %self.core.pattern, error = %e, "listener task failed"),
            Err(_) => warn!(
                pattern = %self.core.pattern,
                timeout = ?self.close_timeout,
                "listener did not stop in time; continuing in background"
            ),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.core.mark_closed();
        self.core.cancel.cancel();
    }
}

/// Opens a subscription on `handle` and starts its listener.
///
/// # Errors
///
/// - [`SubscribeError::Transport`] if the stream cannot be opened.
/// - [`SubscribeError::Handshake`] if the broker refuses the subscription.
/// - [`SubscribeError::Timeout`] if it is not confirmed within `setup_timeout`.
///
/// No handle is returned on failure and the half-open stream is released.
pub async fn subscribe<T, X>(
    handle: &TransportHandle<T>,
    pattern: Channel,
    handler: X,
    options: &SubscriptionOptions,
) -> Result<Subscription, SubscribeError>
where
    T: Transport,
    X: SubscriptionHandler,
{
    let core = Arc::new(Core::new(pattern.clone(), SubscriptionState::Pending));
    let mut stream = handle.open_stream(&pattern).await?;

    let handshake = match timeout(options.setup_timeout, stream.ready()).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(SubscribeError::Handshake {
            pattern: pattern.to_string(),
            source,
        }),
        Err(_) => Err(SubscribeError::Timeout {
            pattern: pattern.to_string(),
            timeout: options.setup_timeout,
        }),
    };

    if let Err(error) = handshake {
        warn!(pattern = %pattern, error = %error, "subscribe failed");
        if let Err(e) = stream.release().await {
            debug!(pattern = %pattern, error = %e, "failed to release half-open stream");
        }
        return Err(error);
    }

    core.transition(SubscriptionState::Pending, SubscriptionState::Active);
    info!(pattern = %pattern, id = %core.id, "subscribed");

    let listener = tokio::spawn(listen(core.clone(), stream, handler));

    Ok(Subscription {
        core,
        close_timeout: options.close_timeout,
        listener: Mutex::new(Some(listener)),
        simulated: false,
    })
}

async fn listen<S, X>(core: Arc<Core>, mut stream: S, handler: X)
where
    S: TransportStream,
    X: SubscriptionHandler,
{
    loop {
        let event = tokio::select! {
            biased;
            () = core.cancel.cancelled() => break,
            event = stream.next_event() => event,
        };

        // A close may have landed while the event was being received.
        if core.state() == SubscriptionState::Closed {
            break;
        }

        match event {
            Some(StreamEvent::Message(message)) => {
                let (channel, payload) = message.into_parts();
                if let Err(e) = handler.on_message(channel.clone(), payload).await {
                    warn!(channel = %channel, error = %e, "message handler failed");
                }
            }
            Some(StreamEvent::Error(stream_error)) => {
                if !core.transition(SubscriptionState::Active, SubscriptionState::Erroring) {
                    break;
                }
                warn!(pattern = %core.pattern, error = %stream_error, "stream error");

                if handler.on_stream_error(stream_error).await {
                    if !core.transition(SubscriptionState::Erroring, SubscriptionState::Active) {
                        break;
                    }
                } else {
                    core.mark_closed();
                    break;
                }
            }
            Some(StreamEvent::Closed) | None => {
                info!(pattern = %core.pattern, "stream closed by broker");
                core.mark_closed();
                break;
            }
        }
    }

    core.mark_closed();
    handler.on_stream_closed().await;

    if let Err(e) = stream.release().await {
        warn!(pattern = %core.pattern, error = %e, "failed to release stream");
    }
    debug!(pattern = %core.pattern, id = %core.id, "listener stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core() -> Core {
        Core::new(Channel::new("local/#").unwrap(), SubscriptionState::Pending)
    }

    #[test]
    fn test_transition_requires_expected_state() {
        let core = core();
        assert!(!core.transition(SubscriptionState::Active, SubscriptionState::Erroring));
        assert!(core.transition(SubscriptionState::Pending, SubscriptionState::Active));
        assert!(core.transition(SubscriptionState::Active, SubscriptionState::Erroring));
        assert_eq!(core.state(), SubscriptionState::Erroring);
    }

    #[test]
    fn test_closed_is_terminal() {
        let core = core();
        assert!(core.mark_closed());
        assert!(!core.mark_closed());
        assert!(!core.transition(SubscriptionState::Closed, SubscriptionState::Active));
        assert_eq!(core.state(), SubscriptionState::Closed);
    }

    #[tokio::test]
    async fn test_simulated_subscription_lifecycle() {
        let subscription = Subscription::simulated(Channel::new("local/alerts/*").unwrap());
        let changes = subscription.state_changes();
        assert!(subscription.is_simulated());
        assert_eq!(*changes.borrow(), SubscriptionState::Active);

        subscription.close().await;
        subscription.close().await;
        assert_eq!(*changes.borrow(), SubscriptionState::Closed);
    }
}
