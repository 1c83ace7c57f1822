use std::sync::Arc;

use parking_lot::Mutex;

use crate::channel::Channel;
use crate::message::Message;
use crate::qos::QoS;

/// Something a simulated client would have done against a real broker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SimulatedAction {
    /// A publish that was logged instead of sent.
    Publish {
        /// The message that would have been sent.
        message: Message,
        /// Requested QoS.
        qos: QoS,
    },

    /// A subscription that was accepted but will never deliver.
    Subscribe {
        /// Requested pattern.
        pattern: Channel,
    },
}

/// Shared log of simulated actions. Clones record into the same log.
#[derive(Clone, Debug, Default)]
pub struct SimulationRecorder {
    actions: Arc<Mutex<Vec<SimulatedAction>>>,
}

impl SimulationRecorder {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&self, action: SimulatedAction) {
        self.actions.lock().push(action);
    }

    /// All recorded actions in order.
    #[must_use]
    pub fn actions(&self) -> Vec<SimulatedAction> {
        self.actions.lock().clone()
    }

    /// Messages that would have been published.
    #[must_use]
    pub fn published(&self) -> Vec<Message> {
        self.actions
            .lock()
            .iter()
            .filter_map(|action| match action {
                SimulatedAction::Publish { message, .. } => Some(message.clone()),
                SimulatedAction::Subscribe { .. } => None,
            })
            .collect()
    }

    /// Patterns that would have been subscribed to.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<Channel> {
        self.actions
            .lock()
            .iter()
            .filter_map(|action| match action {
                SimulatedAction::Subscribe { pattern } => Some(pattern.clone()),
                SimulatedAction::Publish { .. } => None,
            })
            .collect()
    }

    /// Number of recorded actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.lock().len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.lock().is_empty()
    }

    /// Forgets everything recorded so far.
    pub fn clear(&self) {
        self.actions.lock().clear();
    }
}
