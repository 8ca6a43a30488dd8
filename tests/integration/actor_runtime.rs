//! Actor runtime tests: ordering, priority, routing drops and shutdown

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use pretty_assertions::assert_eq;
use ruleflow::config::ActorConfig;
use ruleflow::{Actor, ActorEnvelope, ActorRuntime, EnvelopeKind};

use super::helpers::{init_tracing, wait_for};

/// Records every payload it handles and detects overlapping handler runs.
struct RecorderActor {
    log: Arc<Mutex<Vec<String>>>,
    active: Arc<AtomicBool>,
    overlap: Arc<AtomicBool>,
    /// Payloads equal to "block" park the handler until the gate fires.
    gate: Option<mpsc::Receiver<()>>,
    blocked: Arc<AtomicBool>,
}

impl RecorderActor {
    fn new(log: Arc<Mutex<Vec<String>>>, overlap: Arc<AtomicBool>) -> Self {
        Self {
            log,
            active: Arc::new(AtomicBool::new(false)),
            overlap,
            gate: None,
            blocked: Arc::new(AtomicBool::new(false)),
        }
    }

    fn with_gate(mut self, gate: mpsc::Receiver<()>, blocked: Arc<AtomicBool>) -> Self {
        self.gate = Some(gate);
        self.blocked = blocked;
        self
    }
}

impl Actor for RecorderActor {
    fn process(&mut self, _ctx: &ruleflow::ActorContext, envelope: ActorEnvelope) -> Result<()> {
        let EnvelopeKind::TransportToDevice { payload } = envelope.kind else {
            return Ok(());
        };

        if self.active.swap(true, Ordering::SeqCst) {
            self.overlap.store(true, Ordering::SeqCst);
        }

        if payload == "block" {
            if let Some(gate) = &self.gate {
                self.blocked.store(true, Ordering::SeqCst);
                let _ = gate.recv();
            }
        }

        self.log.lock().unwrap().push(payload);
        self.active.store(false, Ordering::SeqCst);
        Ok(())
    }
}

fn payload_env(payload: &str) -> ActorEnvelope {
    ActorEnvelope::to_device(payload)
}

#[tokio::test(flavor = "multi_thread")]
async fn messages_process_sequentially_in_order() {
    init_tracing();
    let runtime = ActorRuntime::new(&ActorConfig::default());
    let log = Arc::new(Mutex::new(Vec::new()));
    let overlap = Arc::new(AtomicBool::new(false));

    runtime
        .create_actor("recorder", RecorderActor::new(log.clone(), overlap.clone()))
        .unwrap();

    for i in 0..100 {
        runtime.tell("recorder", payload_env(&format!("m{i}")));
    }

    assert!(wait_for(|| log.lock().unwrap().len() == 100).await);

    let seen = log.lock().unwrap().clone();
    let expected: Vec<String> = (0..100).map(|i| format!("m{i}")).collect();
    assert_eq!(seen, expected);
    assert!(!overlap.load(Ordering::SeqCst), "handlers overlapped");

    runtime.shutdown().await;
}

// The gated handler parks a worker thread, so the runtime needs more than
// one worker even on single-core machines.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn high_priority_overtakes_queued_normal_messages() {
    init_tracing();
    let runtime = ActorRuntime::new(&ActorConfig::default());
    let log = Arc::new(Mutex::new(Vec::new()));
    let overlap = Arc::new(AtomicBool::new(false));
    let blocked = Arc::new(AtomicBool::new(false));
    let (gate_tx, gate_rx) = mpsc::channel();

    runtime
        .create_actor(
            "recorder",
            RecorderActor::new(log.clone(), overlap.clone()).with_gate(gate_rx, blocked.clone()),
        )
        .unwrap();

    // Park the actor on the first message, then queue behind it.
    runtime.tell("recorder", payload_env("block"));
    assert!(wait_for(|| blocked.load(Ordering::SeqCst)).await);

    runtime.tell("recorder", payload_env("normal-1"));
    runtime.tell("recorder", payload_env("normal-2"));
    runtime.tell_high_priority("recorder", payload_env("urgent"));

    gate_tx.send(()).unwrap();
    assert!(wait_for(|| log.lock().unwrap().len() == 4).await);

    let seen = log.lock().unwrap().clone();
    assert_eq!(seen, vec!["block", "urgent", "normal-1", "normal-2"]);

    runtime.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_target_invokes_dropped_callback_exactly_once() {
    init_tracing();
    let runtime = ActorRuntime::new(&ActorConfig::default());
    let dropped = Arc::new(AtomicUsize::new(0));
    let counter = dropped.clone();

    runtime.tell(
        "ghost",
        payload_env("lost").with_dropped_callback(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );

    assert_eq!(dropped.load(Ordering::SeqCst), 1);
    runtime.shutdown().await;
}

/// Counts `init` invocations.
struct InitProbe {
    inits: Arc<AtomicUsize>,
    fail: bool,
}

impl Actor for InitProbe {
    fn init(&mut self, _ctx: &ruleflow::ActorContext) -> Result<()> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("nope");
        }
        Ok(())
    }

    fn process(&mut self, _ctx: &ruleflow::ActorContext, _envelope: ActorEnvelope) -> Result<()> {
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn create_actor_is_idempotent_and_inits_once() {
    init_tracing();
    let runtime = ActorRuntime::new(&ActorConfig::default());
    let first_inits = Arc::new(AtomicUsize::new(0));
    let second_inits = Arc::new(AtomicUsize::new(0));

    let first = runtime
        .create_actor("probe", InitProbe { inits: first_inits.clone(), fail: false })
        .unwrap();
    let second = runtime
        .create_actor("probe", InitProbe { inits: second_inits.clone(), fail: false })
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first_inits.load(Ordering::SeqCst), 1);
    assert_eq!(second_inits.load(Ordering::SeqCst), 0);
    assert_eq!(runtime.actor_count(), 1);

    runtime.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_init_removes_the_actor() {
    init_tracing();
    let runtime = ActorRuntime::new(&ActorConfig::default());
    let inits = Arc::new(AtomicUsize::new(0));

    let result = runtime.create_actor("broken", InitProbe { inits, fail: true });
    assert!(result.is_err());
    assert_eq!(runtime.actor_count(), 0);

    // Routing to the failed actor drops like any unknown target.
    let dropped = Arc::new(AtomicUsize::new(0));
    let counter = dropped.clone();
    runtime.tell(
        "broken",
        payload_env("x").with_dropped_callback(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );
    assert_eq!(dropped.load(Ordering::SeqCst), 1);

    runtime.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn backlog_larger_than_one_batch_drains_completely() {
    init_tracing();
    let runtime = ActorRuntime::new(&ActorConfig::default());
    let log = Arc::new(Mutex::new(Vec::new()));
    let overlap = Arc::new(AtomicBool::new(false));

    runtime
        .create_actor("recorder", RecorderActor::new(log.clone(), overlap.clone()))
        .unwrap();

    // Well past one batch worth of envelopes.
    for i in 0..25 {
        runtime.tell("recorder", payload_env(&format!("m{i}")));
    }

    assert!(wait_for(|| log.lock().unwrap().len() == 25).await);
    assert_eq!(log.lock().unwrap()[24], "m24");

    runtime.shutdown().await;
}

/// Handles each envelope slowly so shutdown races a long backlog.
struct SlowActor {
    processed: Arc<AtomicUsize>,
}

impl Actor for SlowActor {
    fn process(&mut self, _ctx: &ruleflow::ActorContext, _envelope: ActorEnvelope) -> Result<()> {
        std::thread::sleep(Duration::from_millis(5));
        self.processed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_accounts_for_every_queued_message() {
    init_tracing();
    let runtime = ActorRuntime::new(&ActorConfig::default());
    let processed = Arc::new(AtomicUsize::new(0));

    runtime
        .create_actor("slow", SlowActor { processed: processed.clone() })
        .unwrap();

    // One drop slot per message so double invocations are visible.
    let total = 40;
    let drops: Arc<Vec<AtomicUsize>> = Arc::new((0..total).map(|_| AtomicUsize::new(0)).collect());

    for i in 0..total {
        let slots = drops.clone();
        runtime.tell(
            "slow",
            payload_env(&format!("m{i}")).with_dropped_callback(move || {
                slots[i].fetch_add(1, Ordering::SeqCst);
            }),
        );
    }

    // Let a few through, then pull the plug.
    tokio::time::sleep(Duration::from_millis(25)).await;
    runtime.shutdown().await;

    let dropped: usize = drops.iter().map(|slot| slot.load(Ordering::SeqCst)).sum();
    assert!(
        drops.iter().all(|slot| slot.load(Ordering::SeqCst) <= 1),
        "a dropped-callback fired twice"
    );
    assert_eq!(
        processed.load(Ordering::SeqCst) + dropped,
        total,
        "every message must be either processed or dropped"
    );

    // Nothing routes after shutdown.
    let late = Arc::new(AtomicUsize::new(0));
    let counter = late.clone();
    runtime.tell(
        "slow",
        payload_env("late").with_dropped_callback(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );
    assert_eq!(late.load(Ordering::SeqCst), 1);
    assert!(runtime.create_actor("post", SlowActor { processed }).is_err());
}

/// Deregisters itself on the first payload it sees.
struct SelfStopper {
    destroyed: Arc<AtomicBool>,
}

impl Actor for SelfStopper {
    fn process(&mut self, ctx: &ruleflow::ActorContext, _envelope: ActorEnvelope) -> Result<()> {
        ctx.stop(ctx.self_id());
        Ok(())
    }

    fn destroy(&mut self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn actor_can_stop_itself_from_its_own_handler() {
    init_tracing();
    let runtime = ActorRuntime::new(&ActorConfig::default());
    let destroyed = Arc::new(AtomicBool::new(false));

    runtime
        .create_actor("ephemeral", SelfStopper { destroyed: destroyed.clone() })
        .unwrap();

    runtime.tell("ephemeral", payload_env("quit"));

    // The handler returns and the deferred teardown runs; nothing wedges.
    assert!(wait_for(|| destroyed.load(Ordering::SeqCst)).await);
    assert_eq!(runtime.actor_count(), 0);

    // Deregistered: later messages drop like any unknown target.
    let dropped = Arc::new(AtomicUsize::new(0));
    let counter = dropped.clone();
    runtime.tell(
        "ephemeral",
        payload_env("late").with_dropped_callback(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );
    assert_eq!(dropped.load(Ordering::SeqCst), 1);

    runtime.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_deregisters_and_drops_later_messages() {
    init_tracing();
    let runtime = ActorRuntime::new(&ActorConfig::default());
    let log = Arc::new(Mutex::new(Vec::new()));
    let overlap = Arc::new(AtomicBool::new(false));

    runtime
        .create_actor("recorder", RecorderActor::new(log.clone(), overlap.clone()))
        .unwrap();
    assert_eq!(runtime.actor_count(), 1);

    runtime.stop("recorder");
    assert_eq!(runtime.actor_count(), 0);

    let dropped = Arc::new(AtomicUsize::new(0));
    let counter = dropped.clone();
    runtime.tell(
        "recorder",
        payload_env("x").with_dropped_callback(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );
    assert_eq!(dropped.load(Ordering::SeqCst), 1);

    // Stopping twice is harmless.
    runtime.stop("recorder");
    runtime.shutdown().await;
}
