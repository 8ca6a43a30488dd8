//! Telemetry persistence node.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use crate::message::Message;
use crate::rules::chain::{NodeOutcome, RuleNode};
use crate::storage::TelemetryStorage;

/// Writes the message's telemetry into storage, then always forwards.
///
/// A storage failure aborts the chain traversal for this message; the error
/// surfaces as a failed chain outcome.
pub struct SaveTelemetryNode {
    storage: Arc<dyn TelemetryStorage>,
}

impl SaveTelemetryNode {
    pub fn new(storage: Arc<dyn TelemetryStorage>) -> Self {
        Self { storage }
    }
}

impl RuleNode for SaveTelemetryNode {
    fn name(&self) -> &str {
        "SaveTelemetryNode"
    }

    fn node_type(&self) -> &'static str {
        "SAVE_TELEMETRY"
    }

    fn on_msg(&mut self, msg: Message) -> Result<NodeOutcome> {
        self.storage
            .save(msg.originator(), msg.timestamp_ms(), msg.data(), msg.entries())
            .with_context(|| format!("failed to save telemetry for device {}", msg.originator()))?;

        debug!(
            "[SaveTelemetryNode] saved {} entries for device {}",
            msg.entries().len(),
            msg.originator()
        );
        Ok(NodeOutcome::Forward(msg))
    }
}
