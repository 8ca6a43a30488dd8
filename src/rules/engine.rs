//! Chain registry and message routing.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{bail, Result};
use tracing::{info, warn};

use super::chain::RuleChain;
use crate::actors::envelope::ActorEnvelope;
use crate::actors::rule_chain::{rule_chain_actor_id, RuleChainActor};
use crate::actors::runtime::{ActorContext, ActorRuntime};
use crate::ids::RuleChainId;
use crate::message::Message;

/// Knows every registered rule chain and routes messages to the right one.
///
/// A message carrying an explicit rule-chain id goes there; everything else
/// goes to the root chain. The first chain registered becomes root until
/// [`RuleEngine::set_root_chain`] says otherwise.
#[derive(Default)]
pub struct RuleEngine {
    chains: RwLock<HashMap<RuleChainId, String>>,
    root: RwLock<Option<RuleChainId>>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn an actor hosting the chain and record it in the registry.
    pub fn register_chain(&self, runtime: &ActorRuntime, chain: RuleChain) -> Result<RuleChainId> {
        let id = chain.id;
        let name = chain.name.clone();
        let actor_id = rule_chain_actor_id(&id);

        runtime.create_actor(actor_id.clone(), RuleChainActor::new(chain))?;
        self.chains
            .write()
            .expect("chain registry lock poisoned")
            .insert(id, actor_id);

        let mut root = self.root.write().expect("chain registry lock poisoned");
        if root.is_none() {
            info!("rule chain [{name}] registered as root");
            *root = Some(id);
        } else {
            info!("rule chain [{name}] registered");
        }

        Ok(id)
    }

    pub fn set_root_chain(&self, id: RuleChainId) -> Result<()> {
        if !self
            .chains
            .read()
            .expect("chain registry lock poisoned")
            .contains_key(&id)
        {
            bail!("cannot set root: rule chain {id} is not registered");
        }
        *self.root.write().expect("chain registry lock poisoned") = Some(id);
        Ok(())
    }

    pub fn root_chain(&self) -> Option<RuleChainId> {
        *self.root.read().expect("chain registry lock poisoned")
    }

    pub fn chain_count(&self) -> usize {
        self.chains.read().expect("chain registry lock poisoned").len()
    }

    /// Forward a message to its target chain's actor.
    ///
    /// An unknown explicit chain id falls back to the root chain; with no
    /// root registered the message is dropped with a warning.
    pub fn dispatch(&self, ctx: &ActorContext, message: Message) {
        let chains = self.chains.read().expect("chain registry lock poisoned");

        let target = message
            .rule_chain_id()
            .filter(|id| {
                let known = chains.contains_key(id);
                if !known {
                    warn!("message {} targets unknown rule chain {id}, using root", message.id());
                }
                known
            })
            .copied()
            .or_else(|| self.root_chain());

        let Some(target) = target else {
            warn!("no root rule chain registered, dropping message {}", message.id());
            return;
        };

        // Registered chains always have an actor id entry.
        if let Some(actor_id) = chains.get(&target) {
            ctx.tell(actor_id, ActorEnvelope::to_rule_chain(message));
        }
    }
}
