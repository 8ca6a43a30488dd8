//! Alarm lifecycle operations and the fire-and-forget update channel.
//!
//! Every mutation goes through this service so that interested subscribers
//! (push channels, dashboards) observe a consistent event stream. Publishing
//! never blocks and never fails the mutation: with no subscribers the event
//! is simply discarded.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info};

use super::model::{Alarm, AlarmSeverity};
use super::repository::AlarmRepository;
use crate::ids::{AlarmId, DeviceId};

/// Capacity of the alarm update broadcast channel. Slow subscribers lag and
/// lose oldest events rather than applying backpressure.
const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// What happened to an alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmUpdateKind {
    Created,
    SeverityChanged,
    Acknowledged,
    Cleared,
}

/// A snapshot of an alarm after a lifecycle mutation.
#[derive(Debug, Clone)]
pub struct AlarmUpdate {
    pub kind: AlarmUpdateKind,
    pub alarm: Alarm,
}

/// Alarm lifecycle service on top of an [`AlarmRepository`].
pub struct AlarmService {
    repository: Arc<dyn AlarmRepository>,
    updates: broadcast::Sender<AlarmUpdate>,
}

impl AlarmService {
    pub fn new(repository: Arc<dyn AlarmRepository>) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self { repository, updates }
    }

    /// Subscribe to alarm lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<AlarmUpdate> {
        self.updates.subscribe()
    }

    /// Create a new alarm, or update the severity of the active alarm of the
    /// same type. Unchanged severity is a no-op.
    pub fn create_or_update(
        &self,
        device: &DeviceId,
        device_name: &str,
        alarm_type: &str,
        severity: AlarmSeverity,
    ) -> Alarm {
        let now = crate::now_ms();

        let existing = self
            .repository
            .find_latest_by_originator_and_type(device, alarm_type)
            .filter(|alarm| !alarm.is_cleared());

        match existing {
            Some(mut alarm) => {
                if alarm.update_severity(severity, now) {
                    info!(
                        "alarm severity updated: {alarm_type} -> {severity:?} ({device_name})"
                    );
                    let saved = self.repository.save(alarm);
                    self.publish(AlarmUpdateKind::SeverityChanged, &saved);
                    saved
                } else {
                    debug!("alarm {alarm_type} already active at {severity:?}, nothing to do");
                    alarm
                }
            }
            None => {
                let alarm = Alarm::new(*device, device_name, alarm_type, severity, now);
                info!("alarm created: {alarm_type} [{severity:?}] ({device_name})");
                let saved = self.repository.save(alarm);
                self.publish(AlarmUpdateKind::Created, &saved);
                saved
            }
        }
    }

    /// Clear an alarm by id. Returns the cleared alarm, or `None` if it does
    /// not exist. Clearing an already-cleared alarm is a no-op.
    pub fn clear(&self, id: &AlarmId) -> Option<Alarm> {
        let mut alarm = self.repository.find_by_id(id)?;

        if !alarm.clear(crate::now_ms()) {
            debug!("alarm {id} already cleared");
            return Some(alarm);
        }

        info!("alarm cleared: {} ({})", alarm.alarm_type, alarm.originator_name);
        let saved = self.repository.save(alarm);
        self.publish(AlarmUpdateKind::Cleared, &saved);
        Some(saved)
    }

    /// Clear the active alarm of a type for a device, if one exists.
    pub fn clear_by_type(&self, device: &DeviceId, alarm_type: &str) -> Option<Alarm> {
        let existing = self
            .repository
            .find_latest_by_originator_and_type(device, alarm_type)
            .filter(|alarm| !alarm.is_cleared())?;

        self.clear(&existing.id)
    }

    /// Acknowledge an alarm by id. Acknowledging a cleared or already
    /// acknowledged alarm is a no-op.
    pub fn acknowledge(&self, id: &AlarmId) -> Option<Alarm> {
        let mut alarm = self.repository.find_by_id(id)?;

        if !alarm.acknowledge(crate::now_ms()) {
            debug!("alarm {id} not acknowledgeable in state {:?}", alarm.status());
            return Some(alarm);
        }

        info!("alarm acknowledged: {} ({})", alarm.alarm_type, alarm.originator_name);
        let saved = self.repository.save(alarm);
        self.publish(AlarmUpdateKind::Acknowledged, &saved);
        Some(saved)
    }

    pub fn find_by_id(&self, id: &AlarmId) -> Option<Alarm> {
        self.repository.find_by_id(id)
    }

    pub fn find_latest_by_originator_and_type(
        &self,
        device: &DeviceId,
        alarm_type: &str,
    ) -> Option<Alarm> {
        self.repository.find_latest_by_originator_and_type(device, alarm_type)
    }

    pub fn find_by_originator(&self, device: &DeviceId) -> Vec<Alarm> {
        self.repository.find_by_originator(device)
    }

    pub fn find_all_active(&self) -> Vec<Alarm> {
        self.repository.find_all_active()
    }

    fn publish(&self, kind: AlarmUpdateKind, alarm: &Alarm) {
        // Fire-and-forget: an error just means nobody is listening.
        let _ = self.updates.send(AlarmUpdate {
            kind,
            alarm: alarm.clone(),
        });
    }
}
