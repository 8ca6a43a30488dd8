//! Devices, device profiles and the read-only lookup contract.
//!
//! The rule engine only ever needs two lookups: device by id and profile by
//! id. Absence is a normal outcome that callers handle by skipping work, not
//! an error.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::alarms::rule::AlarmRule;
use crate::ids::{DeviceId, ProfileId, RuleChainId};

/// A registered device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub profile_id: ProfileId,
}

impl Device {
    pub fn new(name: impl Into<String>, profile_id: ProfileId) -> Self {
        Self {
            id: DeviceId::random(),
            name: name.into(),
            profile_id,
        }
    }
}

/// Shared configuration for a class of devices.
///
/// The profile carries the alarm rules evaluated against the device's
/// telemetry and optional routing hints for the rule engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub id: ProfileId,
    pub name: String,
    pub alarm_rules: Vec<AlarmRule>,
    /// Messages from devices of this profile are routed here instead of the
    /// root rule chain when set.
    pub default_rule_chain_id: Option<RuleChainId>,
    pub default_queue: Option<String>,
}

impl DeviceProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ProfileId::random(),
            name: name.into(),
            alarm_rules: Vec::new(),
            default_rule_chain_id: None,
            default_queue: None,
        }
    }

    pub fn with_alarm_rule(mut self, rule: AlarmRule) -> Self {
        self.alarm_rules.push(rule);
        self
    }

    pub fn with_default_rule_chain(mut self, id: RuleChainId) -> Self {
        self.default_rule_chain_id = Some(id);
        self
    }
}

/// Read-only device/profile lookup used by rule nodes.
pub trait DeviceLookup: Send + Sync {
    fn find_device(&self, id: &DeviceId) -> Option<Device>;
    fn find_profile(&self, id: &ProfileId) -> Option<DeviceProfile>;
}

/// In-memory device registry, the reference [`DeviceLookup`] implementation.
#[derive(Default)]
pub struct InMemoryDeviceRegistry {
    devices: RwLock<HashMap<DeviceId, Device>>,
    profiles: RwLock<HashMap<ProfileId, DeviceProfile>>,
}

impl InMemoryDeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_device(&self, device: Device) {
        self.devices
            .write()
            .expect("device registry lock poisoned")
            .insert(device.id, device);
    }

    pub fn add_profile(&self, profile: DeviceProfile) {
        self.profiles
            .write()
            .expect("device registry lock poisoned")
            .insert(profile.id, profile);
    }

    pub fn device_count(&self) -> usize {
        self.devices.read().expect("device registry lock poisoned").len()
    }
}

impl DeviceLookup for InMemoryDeviceRegistry {
    fn find_device(&self, id: &DeviceId) -> Option<Device> {
        self.devices
            .read()
            .expect("device registry lock poisoned")
            .get(id)
            .cloned()
    }

    fn find_profile(&self, id: &ProfileId) -> Option<DeviceProfile> {
        self.profiles
            .read()
            .expect("device registry lock poisoned")
            .get(id)
            .cloned()
    }
}
