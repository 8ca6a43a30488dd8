//! Per-actor mailbox with priority queues and CAS-guarded draining.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use tracing::{error, trace, warn};

use super::envelope::ActorEnvelope;
use super::runtime::ActorContext;
use super::Actor;

/// Maximum envelopes one drain takes before releasing the worker.
///
/// Keeps a busy mailbox from monopolizing a worker: after a batch the drain
/// re-queues itself, giving other mailboxes a chance to run.
pub const BATCH_SIZE: usize = 10;

/// Mailbox wrapping one actor.
///
/// Two unbounded FIFO queues (high priority drains first) plus an atomic
/// `processing` flag that admits at most one active drain, which is what
/// makes every actor single-threaded without a dedicated thread.
pub struct Mailbox {
    id: String,
    actor: Mutex<Box<dyn Actor>>,
    high: Mutex<VecDeque<ActorEnvelope>>,
    normal: Mutex<VecDeque<ActorEnvelope>>,
    processing: AtomicBool,
    destroyed: AtomicBool,
    torn_down: AtomicBool,
    ctx: ActorContext,
}

impl Mailbox {
    pub(super) fn new(id: String, actor: Box<dyn Actor>, ctx: ActorContext) -> Self {
        Self {
            id,
            actor: Mutex::new(actor),
            high: Mutex::new(VecDeque::new()),
            normal: Mutex::new(VecDeque::new()),
            processing: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            torn_down: AtomicBool::new(false),
            ctx,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Run the actor's init. On failure the mailbox destroys itself so a
    /// half-initialized actor never processes a message.
    pub(super) fn init(self: &Arc<Self>) -> Result<()> {
        let result = {
            let mut actor = self.actor.lock().expect("actor lock poisoned");
            actor.init(&self.ctx)
        };

        if let Err(err) = result {
            error!("actor {} failed to init: {err:#}", self.id);
            self.destroy();
            return Err(err.context(format!("actor {} failed to init", self.id)));
        }

        trace!("actor {} initialized", self.id);
        Ok(())
    }

    /// Queue an envelope and make sure a drain is scheduled.
    pub(super) fn enqueue(self: &Arc<Self>, envelope: ActorEnvelope, high_priority: bool) {
        if self.is_destroyed() {
            trace!("mailbox {} destroyed, dropping {}", self.id, envelope.kind.label());
            envelope.dropped();
            return;
        }

        let queue = if high_priority { &self.high } else { &self.normal };
        queue.lock().expect("queue lock poisoned").push_back(envelope);

        // A destroy may have raced the push; its queue sweep could have run
        // before our envelope landed, so sweep again.
        if self.is_destroyed() {
            self.drop_queued();
            return;
        }

        self.try_schedule();
    }

    /// Schedule a drain task unless one is already active.
    fn try_schedule(self: &Arc<Self>) {
        if self
            .processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let Some(runtime) = self.ctx.runtime() else {
            self.processing.store(false, Ordering::Release);
            return;
        };

        runtime.drain_started();
        let mailbox = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                mailbox.process_batch();

                // A destroy may have arrived while the batch held the actor
                // lock; its teardown is deferred to this task.
                if mailbox.is_destroyed() {
                    mailbox.finalize();
                    break;
                }
                mailbox.processing.store(false, Ordering::Release);

                // More work may have arrived while we held the flag. Whoever
                // wins this CAS (us or a concurrent enqueue) keeps draining.
                if mailbox.is_empty() {
                    break;
                }
                if mailbox
                    .processing
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
                {
                    break;
                }
            }
            runtime.drain_finished();
        });
    }

    /// Process up to [`BATCH_SIZE`] envelopes, high priority first.
    ///
    /// Destruction is only checked at batch start: a batch already running is
    /// never preempted mid-way.
    fn process_batch(&self) {
        if self.is_destroyed() {
            return;
        }

        let mut actor = self.actor.lock().expect("actor lock poisoned");
        for _ in 0..BATCH_SIZE {
            let Some(envelope) = self.pop() else {
                break;
            };

            let label = envelope.kind.label();
            if let Err(err) = actor.process(&self.ctx, envelope) {
                warn!("actor {} failed to process {label}: {err:#}", self.id);
            }
        }
    }

    fn pop(&self) -> Option<ActorEnvelope> {
        if let Some(envelope) = self.high.lock().expect("queue lock poisoned").pop_front() {
            return Some(envelope);
        }
        self.normal.lock().expect("queue lock poisoned").pop_front()
    }

    fn is_empty(&self) -> bool {
        self.high.lock().expect("queue lock poisoned").is_empty()
            && self.normal.lock().expect("queue lock poisoned").is_empty()
    }

    /// Tear the actor down and drop everything still queued.
    ///
    /// Idempotent and non-blocking. With no drain in flight the teardown runs
    /// here; a mid-batch drain finishes its batch first and then runs the
    /// teardown itself, which makes it safe for an actor to stop itself from
    /// inside its own handler.
    pub(super) fn destroy(self: &Arc<Self>) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }

        trace!("destroying actor {}", self.id);
        self.finalize();
    }

    /// Run the actor teardown (exactly once) and sweep the queues.
    ///
    /// When the actor lock is held by an in-flight batch this is a no-op; the
    /// drain task re-runs it after the batch, once the lock is free.
    fn finalize(&self) {
        match self.actor.try_lock() {
            Ok(mut actor) => {
                if !self.torn_down.swap(true, Ordering::AcqRel) {
                    actor.destroy();
                }
            }
            Err(_) => return,
        }
        self.drop_queued();
    }

    fn drop_queued(&self) {
        let mut dropped = 0usize;
        loop {
            let envelope = {
                let mut high = self.high.lock().expect("queue lock poisoned");
                match high.pop_front() {
                    Some(envelope) => Some(envelope),
                    None => self.normal.lock().expect("queue lock poisoned").pop_front(),
                }
            };
            match envelope {
                Some(envelope) => {
                    envelope.dropped();
                    dropped += 1;
                }
                None => break,
            }
        }

        if dropped > 0 {
            trace!("mailbox {} dropped {dropped} queued envelopes", self.id);
        }
    }
}
