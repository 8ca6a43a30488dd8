//! Single-shot threshold alarm node.

use anyhow::Result;
use serde_json::json;
use tracing::warn;

use crate::alarms::{Alarm, AlarmSeverity};
use crate::message::Message;
use crate::rules::chain::{NodeOutcome, RuleNode};

/// Raises an alarm whenever the value at `key` exceeds `threshold`.
///
/// Unlike the profile-driven evaluator this node is stateless and does not
/// persist anything: it builds the alarm, logs it and forwards the message.
/// Delivery to a repository or notification channel is up to whoever reads
/// [`AlarmNode::last_alarm`] or replaces this node with the evaluator.
pub struct AlarmNode {
    name: String,
    alarm_type: String,
    key: String,
    threshold: f64,
    severity: AlarmSeverity,
    last_alarm: Option<Alarm>,
}

impl AlarmNode {
    pub fn new(
        name: impl Into<String>,
        alarm_type: impl Into<String>,
        key: impl Into<String>,
        threshold: f64,
        severity: AlarmSeverity,
    ) -> Self {
        Self {
            name: name.into(),
            alarm_type: alarm_type.into(),
            key: key.into(),
            threshold,
            severity,
            last_alarm: None,
        }
    }

    /// The most recently raised alarm, if any.
    pub fn last_alarm(&self) -> Option<&Alarm> {
        self.last_alarm.as_ref()
    }

    fn build_alarm(&self, msg: &Message, value: f64) -> Alarm {
        let mut alarm = Alarm::new(
            *msg.originator(),
            msg.originator().to_string(),
            &self.alarm_type,
            self.severity,
            crate::now_ms(),
        );
        alarm.details = Some(json!({
            "metricKey": self.key,
            "value": value,
            "threshold": self.threshold,
        }));
        alarm
    }
}

impl RuleNode for AlarmNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn node_type(&self) -> &'static str {
        "ALARM"
    }

    fn on_msg(&mut self, msg: Message) -> Result<NodeOutcome> {
        let exceeded = msg
            .entries()
            .iter()
            .filter(|entry| entry.key == self.key)
            .filter_map(|entry| entry.as_f64())
            .find(|value| *value > self.threshold);

        if let Some(value) = exceeded {
            warn!(
                "[{}] alarm triggered: {} - {}={value} (threshold {})",
                self.name, self.alarm_type, self.key, self.threshold
            );
            self.last_alarm = Some(self.build_alarm(&msg, value));
        }

        Ok(NodeOutcome::Forward(msg))
    }
}
