//! The actor runtime: registry, routing and lifecycle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

use anyhow::{bail, Result};
use tokio::sync::Notify;
use tracing::{debug, info, instrument, warn};

use super::envelope::ActorEnvelope;
use super::mailbox::Mailbox;
use super::Actor;
use crate::config::ActorConfig;

/// Shared runtime state behind [`ActorRuntime`] handles.
pub(super) struct RuntimeInner {
    actors: RwLock<HashMap<String, Arc<Mailbox>>>,
    stopped: AtomicBool,
    /// Number of mailbox drain tasks currently running.
    inflight: AtomicUsize,
    idle: Notify,
    shutdown_timeout: Duration,
}

impl RuntimeInner {
    pub(super) fn drain_started(&self) {
        self.inflight.fetch_add(1, Ordering::AcqRel);
    }

    pub(super) fn drain_finished(&self) {
        if self.inflight.fetch_sub(1, Ordering::AcqRel) == 1 {
            // Last drain out wakes a pending shutdown, if any.
            self.idle.notify_one();
        }
    }

    fn tell_impl(&self, target: &str, envelope: ActorEnvelope, high_priority: bool) {
        if self.stopped.load(Ordering::Acquire) {
            debug!("runtime stopped, dropping {} for {target}", envelope.kind.label());
            envelope.dropped();
            return;
        }

        let mailbox = self
            .actors
            .read()
            .expect("actor registry lock poisoned")
            .get(target)
            .cloned();

        match mailbox {
            Some(mailbox) => mailbox.enqueue(envelope, high_priority),
            None => {
                warn!("no actor registered as {target}, dropping {}", envelope.kind.label());
                envelope.dropped();
            }
        }
    }
}

/// Cloneable handle to the actor runtime.
///
/// The runtime owns no threads of its own; mailbox drains run on the ambient
/// tokio worker pool, so a multi-threaded tokio runtime must be active
/// whenever messages flow. `stop` never blocks on an in-flight handler: a
/// mid-batch mailbox finishes its batch and tears itself down afterwards.
#[derive(Clone)]
pub struct ActorRuntime {
    inner: Arc<RuntimeInner>,
}

impl ActorRuntime {
    pub fn new(config: &ActorConfig) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                actors: RwLock::new(HashMap::new()),
                stopped: AtomicBool::new(false),
                inflight: AtomicUsize::new(0),
                idle: Notify::new(),
                shutdown_timeout: Duration::from_secs(config.shutdown_timeout_secs),
            }),
        }
    }

    /// Register an actor under an id and run its `init`.
    ///
    /// Idempotent: a second registration under the same id returns the
    /// existing mailbox without touching the new actor or re-running `init`.
    /// Registration is expected from setup code, not from concurrent hot
    /// paths.
    pub fn create_actor(
        &self,
        id: impl Into<String>,
        actor: impl Actor + 'static,
    ) -> Result<Arc<Mailbox>> {
        let id = id.into();

        if self.inner.stopped.load(Ordering::Acquire) {
            bail!("cannot create actor {id}: runtime is shut down");
        }

        let mailbox = {
            let mut actors = self.inner.actors.write().expect("actor registry lock poisoned");
            if let Some(existing) = actors.get(&id) {
                debug!("actor {id} already registered");
                return Ok(Arc::clone(existing));
            }

            let ctx = ActorContext {
                runtime: Arc::downgrade(&self.inner),
                self_id: id.clone(),
            };
            let mailbox = Arc::new(Mailbox::new(id.clone(), Box::new(actor), ctx));
            actors.insert(id.clone(), Arc::clone(&mailbox));
            mailbox
        };

        if let Err(err) = mailbox.init() {
            self.inner
                .actors
                .write()
                .expect("actor registry lock poisoned")
                .remove(&id);
            return Err(err);
        }

        debug!("actor {id} registered");
        Ok(mailbox)
    }

    /// Route an envelope to an actor at normal priority.
    ///
    /// Never fails: an unknown target means the envelope is dropped (with its
    /// callback invoked) and a warning logged.
    pub fn tell(&self, target: &str, envelope: ActorEnvelope) {
        self.inner.tell_impl(target, envelope, false);
    }

    /// Route an envelope ahead of all queued normal-priority envelopes.
    pub fn tell_high_priority(&self, target: &str, envelope: ActorEnvelope) {
        self.inner.tell_impl(target, envelope, true);
    }

    pub fn actor_count(&self) -> usize {
        self.inner.actors.read().expect("actor registry lock poisoned").len()
    }

    /// Stop one actor: deregister it, tear it down and drop its queue. The
    /// teardown is deferred when the actor is mid-batch.
    pub fn stop(&self, id: &str) {
        let mailbox = self
            .inner
            .actors
            .write()
            .expect("actor registry lock poisoned")
            .remove(id);

        match mailbox {
            Some(mailbox) => mailbox.destroy(),
            None => debug!("stop: no actor registered as {id}"),
        }
    }

    /// Shut the runtime down.
    ///
    /// Destroys every mailbox (invoking dropped-callbacks for everything
    /// still queued), refuses new routing and waits for in-flight drains to
    /// finish, up to the configured timeout. Idempotent.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        if self.inner.stopped.swap(true, Ordering::AcqRel) {
            return;
        }

        let mailboxes: Vec<Arc<Mailbox>> = {
            let mut actors = self.inner.actors.write().expect("actor registry lock poisoned");
            actors.drain().map(|(_, mailbox)| mailbox).collect()
        };

        info!("shutting down actor runtime ({} actors)", mailboxes.len());
        for mailbox in &mailboxes {
            mailbox.destroy();
        }

        let drained = tokio::time::timeout(self.inner.shutdown_timeout, async {
            loop {
                if self.inner.inflight.load(Ordering::Acquire) == 0 {
                    break;
                }
                self.inner.idle.notified().await;
            }
        })
        .await;

        match drained {
            Ok(()) => info!("actor runtime shut down"),
            Err(_) => warn!(
                "actor runtime shutdown timed out after {:?} with {} drains in flight",
                self.inner.shutdown_timeout,
                self.inner.inflight.load(Ordering::Acquire)
            ),
        }
    }
}

/// The view an actor gets of the runtime while handling an envelope.
///
/// Holds only a weak backreference, so contexts stored inside actors never
/// keep the runtime alive.
#[derive(Clone)]
pub struct ActorContext {
    runtime: Weak<RuntimeInner>,
    self_id: String,
}

impl ActorContext {
    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    pub(super) fn runtime(&self) -> Option<Arc<RuntimeInner>> {
        self.runtime.upgrade()
    }

    pub fn tell(&self, target: &str, envelope: ActorEnvelope) {
        match self.runtime() {
            Some(runtime) => runtime.tell_impl(target, envelope, false),
            None => {
                warn!("runtime gone, dropping {} for {target}", envelope.kind.label());
                envelope.dropped();
            }
        }
    }

    pub fn tell_high_priority(&self, target: &str, envelope: ActorEnvelope) {
        match self.runtime() {
            Some(runtime) => runtime.tell_impl(target, envelope, true),
            None => {
                warn!("runtime gone, dropping {} for {target}", envelope.kind.label());
                envelope.dropped();
            }
        }
    }

    /// Stop another actor (or this one) by id.
    ///
    /// Safe to call from inside a handler, including for the actor's own id:
    /// the mailbox deregisters immediately and defers its teardown until the
    /// current batch has finished.
    pub fn stop(&self, target: &str) {
        if let Some(runtime) = self.runtime() {
            let mailbox = runtime
                .actors
                .write()
                .expect("actor registry lock poisoned")
                .remove(target);
            if let Some(mailbox) = mailbox {
                mailbox.destroy();
            }
        }
    }
}
