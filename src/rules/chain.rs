//! Rule chains: ordered sequences of rule nodes with a driver loop.
//!
//! A node never sees its successor. It returns a [`NodeOutcome`] and the
//! chain decides what happens next: forwarding hands the (possibly modified)
//! message to the next node, stopping ends the traversal quietly, an error
//! aborts the traversal for this message only. Each node owns its state; the
//! hosting actor's mailbox serializes all calls into the chain, so nodes need
//! no internal locking.

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::ids::RuleChainId;
use crate::message::Message;

/// A single node's decision about a message.
#[derive(Debug)]
pub enum NodeOutcome {
    /// Hand the message to the next node in the chain.
    Forward(Message),
    /// End the traversal without error, e.g. a filter non-match.
    Stop,
}

/// The result of one full chain traversal for one message.
#[derive(Debug)]
pub enum ChainOutcome {
    /// Every node forwarded; the message reached the end of the chain.
    Completed,
    /// A node stopped propagation deliberately.
    Stopped { node: String },
    /// A node failed. Only this message is affected; the chain stays usable.
    Failed { node: String, error: anyhow::Error },
}

/// A single-purpose message processor inside a rule chain.
pub trait RuleNode: Send {
    /// Display name, used in logs and chain outcomes.
    fn name(&self) -> &str;

    /// Short node-type tag, e.g. `FILTER`.
    fn node_type(&self) -> &'static str;

    /// One-time setup before the chain starts processing.
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    /// Process one message and decide whether it travels on.
    fn on_msg(&mut self, msg: Message) -> Result<NodeOutcome>;

    /// Teardown when the hosting chain is destroyed.
    fn destroy(&mut self) {}
}

/// An ordered sequence of rule nodes.
pub struct RuleChain {
    pub id: RuleChainId,
    pub name: String,
    pub created_at: i64,
    nodes: Vec<Box<dyn RuleNode>>,
}

impl RuleChain {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: RuleChainId::random(),
            name: name.into(),
            created_at: crate::now_ms(),
            nodes: Vec::new(),
        }
    }

    /// Append a node to the end of the chain.
    pub fn add_node(mut self, node: impl RuleNode + 'static) -> Self {
        info!(
            "rule chain [{}] added node {} ({})",
            self.name,
            node.name(),
            node.node_type()
        );
        self.nodes.push(Box::new(node));
        self
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Initialize every node, in order. The first failure aborts.
    pub fn init(&mut self) -> Result<()> {
        for node in &mut self.nodes {
            let name = node.name().to_string();
            node.init()
                .with_context(|| format!("failed to init rule node {name}"))?;
        }
        Ok(())
    }

    /// Run one message through the chain, node by node.
    pub fn process(&mut self, msg: Message) -> ChainOutcome {
        if self.nodes.is_empty() {
            warn!("rule chain [{}] has no nodes", self.name);
            return ChainOutcome::Completed;
        }

        debug!("rule chain [{}] processing message {}", self.name, msg.id());

        let mut current = msg;
        for node in &mut self.nodes {
            match node.on_msg(current) {
                Ok(NodeOutcome::Forward(next)) => current = next,
                Ok(NodeOutcome::Stop) => {
                    return ChainOutcome::Stopped {
                        node: node.name().to_string(),
                    };
                }
                Err(error) => {
                    warn!("rule chain [{}] node {} failed: {error:#}", self.name, node.name());
                    return ChainOutcome::Failed {
                        node: node.name().to_string(),
                        error,
                    };
                }
            }
        }

        ChainOutcome::Completed
    }

    /// Tear down every node. Called once when the hosting actor is destroyed.
    pub fn destroy(&mut self) {
        for node in &mut self.nodes {
            node.destroy();
        }
    }
}
