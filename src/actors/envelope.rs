//! Envelopes carried through actor mailboxes.

use std::fmt;

use crate::devices::Device;
use crate::message::Message;

/// What an envelope asks the receiving actor to do.
///
/// This is the closed set of messages the runtime routes; actors ignore kinds
/// they do not understand (with a warning) rather than failing.
#[derive(Debug)]
pub enum EnvelopeKind {
    /// Raw transport payload addressed to a device actor.
    TransportToDevice { payload: String },
    /// Business message addressed to the rule engine for chain routing.
    ToRuleEngine { message: Message },
    /// Business message addressed to one specific rule chain.
    ToRuleChain { message: Message },
    DeviceConnected,
    DeviceDisconnected,
    /// The device entity changed, e.g. a renamed device or swapped profile.
    DeviceUpdated { device: Device },
    SystemShutdown,
}

impl EnvelopeKind {
    pub fn label(&self) -> &'static str {
        match self {
            EnvelopeKind::TransportToDevice { .. } => "TRANSPORT_TO_DEVICE",
            EnvelopeKind::ToRuleEngine { .. } => "TO_RULE_ENGINE",
            EnvelopeKind::ToRuleChain { .. } => "TO_RULE_CHAIN",
            EnvelopeKind::DeviceConnected => "DEVICE_CONNECTED",
            EnvelopeKind::DeviceDisconnected => "DEVICE_DISCONNECTED",
            EnvelopeKind::DeviceUpdated { .. } => "DEVICE_UPDATED",
            EnvelopeKind::SystemShutdown => "SYSTEM_SHUTDOWN",
        }
    }
}

/// A routable unit of work: the payload plus an optional dropped-callback.
///
/// The callback fires exactly once if the envelope is never delivered to an
/// actor: unknown target id, destroyed mailbox, or queued at shutdown.
pub struct ActorEnvelope {
    pub kind: EnvelopeKind,
    on_dropped: Option<Box<dyn FnOnce() + Send>>,
}

impl ActorEnvelope {
    pub fn new(kind: EnvelopeKind) -> Self {
        Self {
            kind,
            on_dropped: None,
        }
    }

    pub fn to_device(payload: impl Into<String>) -> Self {
        Self::new(EnvelopeKind::TransportToDevice {
            payload: payload.into(),
        })
    }

    pub fn to_rule_engine(message: Message) -> Self {
        Self::new(EnvelopeKind::ToRuleEngine { message })
    }

    pub fn to_rule_chain(message: Message) -> Self {
        Self::new(EnvelopeKind::ToRuleChain { message })
    }

    /// Attach a callback invoked if this envelope is dropped undelivered.
    pub fn with_dropped_callback(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_dropped = Some(Box::new(callback));
        self
    }

    /// Consume the envelope as dropped, firing the callback if present.
    pub fn dropped(mut self) {
        if let Some(callback) = self.on_dropped.take() {
            callback();
        }
    }
}

impl fmt::Debug for ActorEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorEnvelope")
            .field("kind", &self.kind)
            .field("has_dropped_callback", &self.on_dropped.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn dropped_fires_callback_once() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();

        let envelope = ActorEnvelope::new(EnvelopeKind::DeviceConnected)
            .with_dropped_callback(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });

        envelope.dropped();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropped_without_callback_is_fine() {
        ActorEnvelope::new(EnvelopeKind::SystemShutdown).dropped();
    }

    #[test]
    fn labels_are_stable() {
        assert_eq!(ActorEnvelope::to_device("{}").kind.label(), "TRANSPORT_TO_DEVICE");
        assert_eq!(EnvelopeKind::SystemShutdown.label(), "SYSTEM_SHUTDOWN");
    }
}
