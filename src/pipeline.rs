//! The pipeline facade: one object wiring runtime, rule engine, storage,
//! device registry and alarm stack together.

use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::info;

use crate::actors::device::{device_actor_id, DeviceActor};
use crate::actors::envelope::ActorEnvelope;
use crate::actors::rule_chain::{RuleEngineActor, RULE_ENGINE_ACTOR_ID};
use crate::actors::runtime::ActorRuntime;
use crate::alarms::{AlarmEvaluator, AlarmService, InMemoryAlarmRepository};
use crate::config::PipelineConfig;
use crate::devices::{Device, DeviceLookup, DeviceProfile, InMemoryDeviceRegistry};
use crate::ids::{DeviceId, RuleChainId};
use crate::message::Message;
use crate::rules::chain::RuleChain;
use crate::rules::engine::RuleEngine;
use crate::rules::nodes::{AlarmEvaluatorNode, LogNode, SaveTelemetryNode};
use crate::storage::MemoryStorage;

/// A fully wired telemetry pipeline.
///
/// Construction registers the rule engine actor; devices and rule chains are
/// added afterwards. [`TelemetryPipeline::default_chain`] builds the standard
/// log → save → alarm-evaluate chain for callers that do not need a custom
/// node sequence.
pub struct TelemetryPipeline {
    config: PipelineConfig,
    runtime: ActorRuntime,
    engine: Arc<RuleEngine>,
    devices: Arc<InMemoryDeviceRegistry>,
    storage: Arc<MemoryStorage>,
    alarms: Arc<AlarmService>,
    evaluator: Arc<AlarmEvaluator>,
}

impl TelemetryPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let runtime = ActorRuntime::new(&config.actor);
        let engine = Arc::new(RuleEngine::new());
        let devices = Arc::new(InMemoryDeviceRegistry::new());
        let storage = Arc::new(MemoryStorage::new());
        let alarms = Arc::new(AlarmService::new(Arc::new(InMemoryAlarmRepository::new())));
        let evaluator = Arc::new(AlarmEvaluator::new(alarms.clone()));

        runtime.create_actor(RULE_ENGINE_ACTOR_ID, RuleEngineActor::new(engine.clone()))?;
        info!("telemetry pipeline started");

        Ok(Self {
            config,
            runtime,
            engine,
            devices,
            storage,
            alarms,
            evaluator,
        })
    }

    /// The standard rule chain: log, persist, evaluate alarms.
    pub fn default_chain(&self) -> RuleChain {
        RuleChain::new(self.config.root_chain_name.clone())
            .add_node(LogNode::new("inbound"))
            .add_node(SaveTelemetryNode::new(self.storage.clone()))
            .add_node(AlarmEvaluatorNode::new(
                self.devices.clone(),
                self.evaluator.clone(),
            ))
    }

    pub fn add_profile(&self, profile: DeviceProfile) {
        self.devices.add_profile(profile);
    }

    /// Register a device and spawn its actor. The device's profile must have
    /// been added first.
    pub fn register_device(&self, device: Device) -> Result<()> {
        let Some(profile) = self.devices.find_profile(&device.profile_id) else {
            bail!(
                "cannot register device {}: unknown profile {}",
                device.name,
                device.profile_id
            );
        };

        self.devices.add_device(device.clone());
        self.runtime.create_actor(
            device_actor_id(&device.id),
            DeviceActor::new(device, profile, self.config.default_queue.clone()),
        )?;
        Ok(())
    }

    /// Deregister a device: stop its actor and forget its evaluation state.
    pub fn remove_device(&self, device: &DeviceId) {
        self.runtime.stop(&device_actor_id(device));
        self.evaluator.clear_device_contexts(device);
    }

    pub fn register_chain(&self, chain: RuleChain) -> Result<RuleChainId> {
        self.engine.register_chain(&self.runtime, chain)
    }

    pub fn set_root_chain(&self, id: RuleChainId) -> Result<()> {
        self.engine.set_root_chain(id)
    }

    /// Hand a raw transport payload to a device's actor.
    pub fn submit_telemetry(&self, device: &DeviceId, payload: impl Into<String>) {
        self.runtime
            .tell(&device_actor_id(device), ActorEnvelope::to_device(payload));
    }

    /// Inject an already-built business message directly into the rule engine.
    pub fn submit(&self, message: Message) {
        self.runtime
            .tell(RULE_ENGINE_ACTOR_ID, ActorEnvelope::to_rule_engine(message));
    }

    pub fn runtime(&self) -> &ActorRuntime {
        &self.runtime
    }

    pub fn storage(&self) -> &Arc<MemoryStorage> {
        &self.storage
    }

    pub fn alarms(&self) -> &Arc<AlarmService> {
        &self.alarms
    }

    pub fn devices(&self) -> &Arc<InMemoryDeviceRegistry> {
        &self.devices
    }

    pub async fn shutdown(&self) {
        self.runtime.shutdown().await;
        info!("telemetry pipeline stopped");
    }
}
