//! The alarm aggregate and its state machine.
//!
//! ```text
//! {none} ──create──► ACTIVE_UNACK ──ack──► ACTIVE_ACK
//!                        │                     │
//!                      clear                 clear
//!                        ▼                     ▼
//!                   CLEARED_UNACK          CLEARED_ACK
//! ```
//!
//! Clearing is terminal: a cleared alarm never un-clears, further clears
//! leave it unchanged and a cleared alarm cannot be acknowledged anymore.

use serde::{Deserialize, Serialize};

use crate::ids::{AlarmId, DeviceId};

/// Alarm severity, ordered from most to least severe.
///
/// The derived `Ord` follows declaration order, so `Critical` sorts first.
/// Severity-ordered iteration (highest first) relies on this.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum AlarmSeverity {
    Critical,
    Major,
    Minor,
    Warning,
    Indeterminate,
}

impl AlarmSeverity {
    pub fn is_more_severe_than(self, other: AlarmSeverity) -> bool {
        self < other
    }
}

/// Computed status of an alarm, derived from its cleared/acknowledged flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmStatus {
    ActiveUnack,
    ActiveAck,
    ClearedUnack,
    ClearedAck,
}

impl AlarmStatus {
    pub fn from_flags(cleared: bool, acknowledged: bool) -> Self {
        match (cleared, acknowledged) {
            (false, false) => AlarmStatus::ActiveUnack,
            (false, true) => AlarmStatus::ActiveAck,
            (true, false) => AlarmStatus::ClearedUnack,
            (true, true) => AlarmStatus::ClearedAck,
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, AlarmStatus::ActiveUnack | AlarmStatus::ActiveAck)
    }

    pub fn is_cleared(self) -> bool {
        !self.is_active()
    }

    pub fn is_acknowledged(self) -> bool {
        matches!(self, AlarmStatus::ActiveAck | AlarmStatus::ClearedAck)
    }
}

/// An alarm raised for a device.
///
/// Id, originator, type and start timestamp are fixed at creation; severity,
/// acknowledgement and clearing mutate the alarm in place while it is active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alarm {
    pub id: AlarmId,
    pub originator: DeviceId,
    /// Display name of the originating device, denormalized for logs and UIs.
    pub originator_name: String,
    pub alarm_type: String,
    pub severity: AlarmSeverity,
    pub start_ts: i64,
    /// Last update timestamp; tracks severity changes, acks and clears.
    pub end_ts: i64,
    ack_ts: Option<i64>,
    clear_ts: Option<i64>,
    /// Free-form JSON details, e.g. the triggering value and threshold.
    pub details: Option<serde_json::Value>,
    pub created_time: i64,
}

impl Alarm {
    pub fn new(
        originator: DeviceId,
        originator_name: impl Into<String>,
        alarm_type: impl Into<String>,
        severity: AlarmSeverity,
        now: i64,
    ) -> Self {
        Self {
            id: AlarmId::random(),
            originator,
            originator_name: originator_name.into(),
            alarm_type: alarm_type.into(),
            severity,
            start_ts: now,
            end_ts: now,
            ack_ts: None,
            clear_ts: None,
            details: None,
            created_time: now,
        }
    }

    pub fn status(&self) -> AlarmStatus {
        AlarmStatus::from_flags(self.is_cleared(), self.is_acknowledged())
    }

    pub fn is_cleared(&self) -> bool {
        self.clear_ts.is_some()
    }

    pub fn is_acknowledged(&self) -> bool {
        self.ack_ts.is_some()
    }

    pub fn ack_ts(&self) -> Option<i64> {
        self.ack_ts
    }

    pub fn clear_ts(&self) -> Option<i64> {
        self.clear_ts
    }

    /// Acknowledge the alarm. Returns `false` without changes when the alarm
    /// is already cleared or acknowledged.
    pub fn acknowledge(&mut self, ts: i64) -> bool {
        if self.is_cleared() || self.is_acknowledged() {
            return false;
        }
        self.ack_ts = Some(ts);
        self.end_ts = ts;
        true
    }

    /// Clear the alarm. Idempotent: a second clear keeps the original clear
    /// timestamp and returns `false`.
    pub fn clear(&mut self, ts: i64) -> bool {
        if self.is_cleared() {
            return false;
        }
        self.clear_ts = Some(ts);
        self.end_ts = ts;
        true
    }

    /// Escalate or downgrade severity. Returns `false` when the alarm is
    /// cleared or the severity is unchanged.
    pub fn update_severity(&mut self, severity: AlarmSeverity, ts: i64) -> bool {
        if self.is_cleared() || self.severity == severity {
            return false;
        }
        self.severity = severity;
        self.end_ts = ts;
        true
    }
}
