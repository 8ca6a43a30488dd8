//! The rule engine: chains of single-purpose nodes that transform, filter,
//! persist and alarm on pipeline messages.

pub mod chain;
pub mod engine;
pub mod nodes;

pub use chain::{ChainOutcome, NodeOutcome, RuleChain, RuleNode};
pub use engine::RuleEngine;
