//! Actor-based message dispatch runtime
//!
//! Every addressable component of the pipeline (device, rule chain, rule
//! engine) lives behind a [`Mailbox`](mailbox::Mailbox) in a flat, id-keyed
//! registry. Senders never hold actor references; they address actors by id
//! through the [`ActorRuntime`](runtime::ActorRuntime).
//!
//! ## Dispatch model
//!
//! ```text
//!   tell(id, envelope)
//!        │
//!        ▼
//!   ┌──────────────────────────────┐
//!   │ Mailbox                      │
//!   │  high-priority queue ──┐     │
//!   │  normal queue ─────────┤     │   at most one active
//!   │                        ▼     │   drain per mailbox
//!   │  [CAS processing flag] ──► drain batch on tokio worker
//!   └──────────────────────────────┘
//! ```
//!
//! A drain takes up to [`BATCH_SIZE`](mailbox::BATCH_SIZE) envelopes, high
//! priority first, and feeds them to the actor one at a time. The CAS guard
//! guarantees per-actor sequential processing while unrelated actors drain in
//! parallel on the shared tokio worker pool.
//!
//! ## Failure handling
//!
//! - Routing to an absent actor invokes the envelope's dropped-callback and
//!   logs; it never fails the caller.
//! - A handler error aborts that one envelope, the mailbox keeps draining.
//! - An actor whose `init` fails destroys itself and is removed.

pub mod device;
pub mod envelope;
pub mod mailbox;
pub mod rule_chain;
pub mod runtime;

use anyhow::Result;

use envelope::ActorEnvelope;
use runtime::ActorContext;

pub use device::DeviceActor;
pub use envelope::EnvelopeKind;
pub use mailbox::Mailbox;
pub use rule_chain::{RuleChainActor, RuleEngineActor, RULE_ENGINE_ACTOR_ID};
pub use runtime::ActorRuntime;

/// A message-processing component hosted behind a mailbox.
///
/// All calls into one actor are serialized by its mailbox, so implementations
/// hold plain mutable state without locking.
pub trait Actor: Send {
    /// One-time setup, run synchronously during registration. An error here
    /// destroys the actor before it receives anything.
    fn init(&mut self, _ctx: &ActorContext) -> Result<()> {
        Ok(())
    }

    /// Handle one envelope. An error aborts this envelope only.
    fn process(&mut self, ctx: &ActorContext, envelope: ActorEnvelope) -> Result<()>;

    /// Teardown when the actor is stopped or the runtime shuts down.
    fn destroy(&mut self) {}
}
