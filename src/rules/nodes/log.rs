//! Pass-through log node.

use anyhow::Result;
use tracing::info;

use crate::message::Message;
use crate::rules::chain::{NodeOutcome, RuleNode};

/// Logs a one-line summary of every message and forwards it unchanged.
pub struct LogNode {
    name: String,
}

impl LogNode {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            name: format!("LogNode[{}]", label.into()),
        }
    }
}

impl RuleNode for LogNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn node_type(&self) -> &'static str {
        "LOG"
    }

    fn on_msg(&mut self, msg: Message) -> Result<NodeOutcome> {
        info!(
            "[{}] {:?} from {} with {} entries: {}",
            self.name,
            msg.msg_type(),
            msg.originator(),
            msg.entries().len(),
            msg.data()
        );
        Ok(NodeOutcome::Forward(msg))
    }
}
