//! ruleflow - an actor-based telemetry dispatch runtime with a rule-chain
//! and alarm-evaluation pipeline.
//!
//! Devices publish telemetry payloads, the actor runtime routes them through
//! per-device and per-chain mailboxes, and rule chains transform, filter,
//! persist and alarm on the resulting messages.
//!
//! ## Architecture Overview
//!
//! ```text
//!  transport payload
//!        │ submit_telemetry
//!        ▼
//!  ┌─────────────┐  ToRuleEngine  ┌─────────────────┐  ToRuleChain  ┌────────────────┐
//!  │ DeviceActor │ ─────────────► │ RuleEngineActor │ ────────────► │ RuleChainActor │
//!  └─────────────┘                └─────────────────┘               └────────────────┘
//!    (mailbox)                        (mailbox)                         (mailbox)
//!                                                                           │
//!                                               ┌───────────────────────────┤
//!                                               ▼                           ▼
//!                                       TelemetryStorage             AlarmEvaluator
//!                                                                           │
//!                                                                    AlarmService ──► broadcast
//! ```
//!
//! Every mailbox drains on the shared tokio worker pool with an
//! at-most-one-active-drain guarantee, so messages addressed to the same
//! actor are processed strictly sequentially while different actors run in
//! parallel.

pub mod actors;
pub mod alarms;
pub mod config;
pub mod devices;
pub mod ids;
pub mod message;
pub mod pipeline;
pub mod rules;
pub mod storage;
pub mod telemetry;

pub use actors::Actor;
pub use actors::envelope::{ActorEnvelope, EnvelopeKind};
pub use actors::runtime::{ActorContext, ActorRuntime};
pub use message::{Message, MessageType};
pub use pipeline::TelemetryPipeline;

/// Current time as a unix millisecond timestamp.
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
