//! Threshold filter node.

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::message::Message;
use crate::rules::chain::{NodeOutcome, RuleNode};

/// Forwards a message only when the numeric value at `key` is strictly
/// greater than `threshold`.
///
/// A message without the key passes through unconditionally, so partially
/// populated payloads are never blocked. A present but non-numeric value also
/// passes through, with a warning.
pub struct FilterNode {
    name: String,
    key: String,
    threshold: f64,
}

impl FilterNode {
    pub fn new(key: impl Into<String>, threshold: f64) -> Self {
        let key = key.into();
        Self {
            name: format!("FilterNode[{key} > {threshold}]"),
            key,
            threshold,
        }
    }

    /// Value at the filter key, from typed entries when present, from the raw
    /// JSON payload otherwise. `None` means the key is absent.
    fn extract(&self, msg: &Message) -> Option<FilterInput> {
        if !msg.entries().is_empty() {
            let entry = msg.entries().iter().find(|e| e.key == self.key)?;
            return Some(match entry.as_f64() {
                Some(value) => FilterInput::Numeric(value),
                None => FilterInput::NonNumeric,
            });
        }

        // Fallback for messages carrying only a raw payload.
        let root: Value = serde_json::from_str(msg.data()).ok()?;
        let value = root.get(&self.key)?;
        Some(match value.as_f64() {
            Some(value) => FilterInput::Numeric(value),
            None => FilterInput::NonNumeric,
        })
    }
}

enum FilterInput {
    Numeric(f64),
    NonNumeric,
}

impl RuleNode for FilterNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn node_type(&self) -> &'static str {
        "FILTER"
    }

    fn on_msg(&mut self, msg: Message) -> Result<NodeOutcome> {
        match self.extract(&msg) {
            Some(FilterInput::Numeric(value)) if value > self.threshold => {
                debug!("[{}] message passed: {}={value}", self.name, self.key);
                Ok(NodeOutcome::Forward(msg))
            }
            Some(FilterInput::Numeric(value)) => {
                trace!("[{}] message filtered out: {}={value}", self.name, self.key);
                Ok(NodeOutcome::Stop)
            }
            Some(FilterInput::NonNumeric) => {
                warn!("[{}] key {} is not numeric, passing through", self.name, self.key);
                Ok(NodeOutcome::Forward(msg))
            }
            None => {
                trace!("[{}] key {} absent, passing through", self.name, self.key);
                Ok(NodeOutcome::Forward(msg))
            }
        }
    }
}
