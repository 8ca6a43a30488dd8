//! Per-device actor: turns raw transport payloads into pipeline messages.

use anyhow::Result;
use tracing::{debug, info, warn};

use super::envelope::{ActorEnvelope, EnvelopeKind};
use super::rule_chain::RULE_ENGINE_ACTOR_ID;
use super::runtime::ActorContext;
use super::Actor;
use crate::devices::{Device, DeviceProfile};
use crate::message::Message;
use crate::telemetry::parse_payload;

/// Actor id for a device's mailbox.
pub fn device_actor_id(device: &crate::ids::DeviceId) -> String {
    format!("Device:{device}")
}

/// One mailbox per registered device.
///
/// Holds a snapshot of the device and its profile so payload conversion and
/// routing need no registry lookups on the hot path.
pub struct DeviceActor {
    device: Device,
    profile: DeviceProfile,
    /// Fallback queue when the profile does not name one.
    default_queue: String,
    connected: bool,
}

impl DeviceActor {
    pub fn new(device: Device, profile: DeviceProfile, default_queue: impl Into<String>) -> Self {
        Self {
            device,
            profile,
            default_queue: default_queue.into(),
            connected: false,
        }
    }

    fn handle_payload(&self, ctx: &ActorContext, payload: String) {
        let entries = parse_payload(&payload, crate::now_ms());
        debug!(
            "device {} received payload with {} telemetry entries",
            self.device.name,
            entries.len()
        );
        if !self.connected {
            debug!("device {} published without a connect event", self.device.name);
        }

        let mut msg = Message::telemetry(self.device.id, payload, entries);
        msg.add_metadata("deviceName", &self.device.name);
        msg.add_metadata("deviceProfile", &self.profile.name);

        if let Some(chain) = self.profile.default_rule_chain_id {
            msg = msg.with_rule_chain(chain);
        }
        let queue = self
            .profile
            .default_queue
            .clone()
            .unwrap_or_else(|| self.default_queue.clone());
        msg = msg.with_queue(queue);

        ctx.tell(RULE_ENGINE_ACTOR_ID, ActorEnvelope::to_rule_engine(msg));
    }
}

impl Actor for DeviceActor {
    fn init(&mut self, _ctx: &ActorContext) -> Result<()> {
        debug!("device actor ready: {} ({})", self.device.name, self.device.id);
        Ok(())
    }

    fn process(&mut self, ctx: &ActorContext, envelope: ActorEnvelope) -> Result<()> {
        match envelope.kind {
            EnvelopeKind::TransportToDevice { payload } => self.handle_payload(ctx, payload),
            EnvelopeKind::DeviceConnected => {
                self.connected = true;
                info!("device {} connected", self.device.name);
            }
            EnvelopeKind::DeviceDisconnected => {
                self.connected = false;
                info!("device {} disconnected", self.device.name);
            }
            EnvelopeKind::DeviceUpdated { device } => {
                debug!("device {} updated", device.name);
                self.device = device;
            }
            EnvelopeKind::SystemShutdown => debug!("device {} shutting down", self.device.name),
            other => warn!(
                "device {} ignoring unexpected {}",
                self.device.name,
                other.label()
            ),
        }
        Ok(())
    }

    fn destroy(&mut self) {
        debug!("device actor destroyed: {}", self.device.name);
    }
}
