//! Alarm persistence contract and the in-memory reference implementation.
//!
//! The evaluator never holds alarms beyond one evaluation pass; everything is
//! re-fetched through this contract.

use std::collections::HashMap;
use std::sync::RwLock;

use super::model::{Alarm, AlarmStatus};
use crate::ids::{AlarmId, DeviceId};

/// Storage contract for alarms.
pub trait AlarmRepository: Send + Sync {
    /// Insert or update an alarm, returning the stored value.
    fn save(&self, alarm: Alarm) -> Alarm;

    fn find_by_id(&self, id: &AlarmId) -> Option<Alarm>;

    /// Most recent alarm (by start timestamp) of a type for a device,
    /// regardless of status.
    fn find_latest_by_originator_and_type(
        &self,
        device: &DeviceId,
        alarm_type: &str,
    ) -> Option<Alarm>;

    fn find_by_originator(&self, device: &DeviceId) -> Vec<Alarm>;

    /// All alarms that are not yet cleared.
    fn find_all_active(&self) -> Vec<Alarm>;
}

/// In-memory [`AlarmRepository`] implementation.
#[derive(Default)]
pub struct InMemoryAlarmRepository {
    alarms: RwLock<HashMap<AlarmId, Alarm>>,
}

impl InMemoryAlarmRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.alarms.read().expect("alarm repository lock poisoned").len()
    }

    pub fn count_by_status(&self, status: AlarmStatus) -> usize {
        self.alarms
            .read()
            .expect("alarm repository lock poisoned")
            .values()
            .filter(|alarm| alarm.status() == status)
            .count()
    }
}

impl AlarmRepository for InMemoryAlarmRepository {
    fn save(&self, alarm: Alarm) -> Alarm {
        self.alarms
            .write()
            .expect("alarm repository lock poisoned")
            .insert(alarm.id, alarm.clone());
        alarm
    }

    fn find_by_id(&self, id: &AlarmId) -> Option<Alarm> {
        self.alarms
            .read()
            .expect("alarm repository lock poisoned")
            .get(id)
            .cloned()
    }

    fn find_latest_by_originator_and_type(
        &self,
        device: &DeviceId,
        alarm_type: &str,
    ) -> Option<Alarm> {
        self.alarms
            .read()
            .expect("alarm repository lock poisoned")
            .values()
            .filter(|alarm| &alarm.originator == device && alarm.alarm_type == alarm_type)
            .max_by_key(|alarm| alarm.start_ts)
            .cloned()
    }

    fn find_by_originator(&self, device: &DeviceId) -> Vec<Alarm> {
        let mut alarms: Vec<Alarm> = self
            .alarms
            .read()
            .expect("alarm repository lock poisoned")
            .values()
            .filter(|alarm| &alarm.originator == device)
            .cloned()
            .collect();

        alarms.sort_by_key(|alarm| std::cmp::Reverse(alarm.start_ts));
        alarms
    }

    fn find_all_active(&self) -> Vec<Alarm> {
        self.alarms
            .read()
            .expect("alarm repository lock poisoned")
            .values()
            .filter(|alarm| !alarm.is_cleared())
            .cloned()
            .collect()
    }
}
