//! Actors hosting the rule engine and individual rule chains.
//!
//! Both are thin adapters: they unwrap the routed envelope and call the
//! underlying chain/engine synchronously inside the handler. Ordering and
//! concurrency per chain come entirely from the mailbox.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, trace, warn};

use super::envelope::{ActorEnvelope, EnvelopeKind};
use super::runtime::ActorContext;
use super::Actor;
use crate::ids::RuleChainId;
use crate::rules::chain::{ChainOutcome, RuleChain};
use crate::rules::engine::RuleEngine;

/// Well-known actor id of the rule engine router.
pub const RULE_ENGINE_ACTOR_ID: &str = "RuleEngineActor";

/// Actor id for a rule chain's mailbox.
pub fn rule_chain_actor_id(chain: &RuleChainId) -> String {
    format!("RuleChain:{chain}")
}

/// Routes inbound business messages to the right rule chain actor.
pub struct RuleEngineActor {
    engine: Arc<RuleEngine>,
}

impl RuleEngineActor {
    pub fn new(engine: Arc<RuleEngine>) -> Self {
        Self { engine }
    }
}

impl Actor for RuleEngineActor {
    fn process(&mut self, ctx: &ActorContext, envelope: ActorEnvelope) -> Result<()> {
        match envelope.kind {
            EnvelopeKind::ToRuleEngine { message } => self.engine.dispatch(ctx, message),
            EnvelopeKind::SystemShutdown => debug!("rule engine shutting down"),
            other => warn!("rule engine ignoring unexpected {}", other.label()),
        }
        Ok(())
    }
}

/// Hosts one rule chain behind a mailbox, serializing all its traversals.
pub struct RuleChainActor {
    chain: RuleChain,
    processed: u64,
    failed: u64,
}

impl RuleChainActor {
    pub fn new(chain: RuleChain) -> Self {
        Self {
            chain,
            processed: 0,
            failed: 0,
        }
    }
}

impl Actor for RuleChainActor {
    fn init(&mut self, _ctx: &ActorContext) -> Result<()> {
        self.chain.init()?;
        debug!(
            "rule chain actor ready: [{}] with {} nodes",
            self.chain.name,
            self.chain.node_count()
        );
        Ok(())
    }

    fn process(&mut self, _ctx: &ActorContext, envelope: ActorEnvelope) -> Result<()> {
        match envelope.kind {
            EnvelopeKind::ToRuleChain { message } => {
                match self.chain.process(message) {
                    ChainOutcome::Completed => {
                        self.processed += 1;
                        trace!("chain [{}] completed a message", self.chain.name);
                    }
                    ChainOutcome::Stopped { node } => {
                        self.processed += 1;
                        trace!("chain [{}] stopped at {node}", self.chain.name);
                    }
                    // Already logged by the chain; just account for it.
                    ChainOutcome::Failed { .. } => self.failed += 1,
                }
            }
            EnvelopeKind::SystemShutdown => debug!("chain [{}] shutting down", self.chain.name),
            other => warn!("chain [{}] ignoring unexpected {}", self.chain.name, other.label()),
        }
        Ok(())
    }

    fn destroy(&mut self) {
        self.chain.destroy();
        info!(
            "chain [{}] destroyed after {} processed / {} failed messages",
            self.chain.name, self.processed, self.failed
        );
    }
}
