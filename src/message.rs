//! The business message flowing through the rule engine.
//!
//! A [`Message`] is created once per parsed inbound device payload and then
//! travels through the actor runtime and the rule chain. Originator and type
//! are immutable after creation; nodes that need to change a message work on
//! an owned value and forward a new one.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ids::{DeviceId, RuleChainId};
use crate::telemetry::TsKvEntry;

/// Default queue name for messages without an explicit queue assignment.
pub const DEFAULT_QUEUE: &str = "Main";

/// What kind of business event a message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    PostTelemetry,
    PostAttributes,
    RpcRequest,
    EntityCreated,
    EntityUpdated,
    EntityDeleted,
}

/// The core message of the telemetry pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    id: Uuid,
    msg_type: MessageType,
    originator: DeviceId,
    metadata: HashMap<String, String>,
    /// Raw JSON payload, kept for nodes that work on the wire representation.
    data: String,
    /// Typed entries parsed from the payload.
    entries: Vec<TsKvEntry>,
    timestamp_ms: i64,
    rule_chain_id: Option<RuleChainId>,
    queue: String,
}

impl Message {
    pub fn new(msg_type: MessageType, originator: DeviceId, data: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            msg_type,
            originator,
            metadata: HashMap::new(),
            data: data.into(),
            entries: Vec::new(),
            timestamp_ms: crate::now_ms(),
            rule_chain_id: None,
            queue: DEFAULT_QUEUE.to_string(),
        }
    }

    /// Build a telemetry-post message with its parsed entries.
    pub fn telemetry(originator: DeviceId, data: impl Into<String>, entries: Vec<TsKvEntry>) -> Self {
        let mut msg = Self::new(MessageType::PostTelemetry, originator, data);
        msg.entries = entries;
        msg
    }

    pub fn with_rule_chain(mut self, rule_chain_id: RuleChainId) -> Self {
        self.rule_chain_id = Some(rule_chain_id);
        self
    }

    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn msg_type(&self) -> MessageType {
        self.msg_type
    }

    pub fn originator(&self) -> &DeviceId {
        &self.originator
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn entries(&self) -> &[TsKvEntry] {
        &self.entries
    }

    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    pub fn rule_chain_id(&self) -> Option<&RuleChainId> {
        self.rule_chain_id.as_ref()
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Defensive copy with a fresh id, used when a node forks processing.
    pub fn fork(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            ..self.clone()
        }
    }
}
