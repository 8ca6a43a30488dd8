//! Alarm evaluation node.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, trace};

use crate::alarms::AlarmEvaluator;
use crate::devices::DeviceLookup;
use crate::message::Message;
use crate::rules::chain::{NodeOutcome, RuleNode};
use crate::telemetry::TsKvEntry;

/// Resolves the originating device and its profile, builds a key → latest
/// entry snapshot from the message's typed telemetry and hands it to the
/// alarm evaluator.
///
/// Always forwards: alarm side effects never block the pipeline. Messages
/// without typed entries, unknown devices and profiles without alarm rules
/// skip evaluation entirely.
pub struct AlarmEvaluatorNode {
    lookup: Arc<dyn DeviceLookup>,
    evaluator: Arc<AlarmEvaluator>,
}

impl AlarmEvaluatorNode {
    pub fn new(lookup: Arc<dyn DeviceLookup>, evaluator: Arc<AlarmEvaluator>) -> Self {
        Self { lookup, evaluator }
    }
}

impl RuleNode for AlarmEvaluatorNode {
    fn name(&self) -> &str {
        "AlarmEvaluatorNode"
    }

    fn node_type(&self) -> &'static str {
        "ALARM_EVALUATOR"
    }

    fn on_msg(&mut self, msg: Message) -> Result<NodeOutcome> {
        if msg.entries().is_empty() {
            trace!("[AlarmEvaluatorNode] message carries no typed telemetry, skipping");
            return Ok(NodeOutcome::Forward(msg));
        }

        let Some(device) = self.lookup.find_device(msg.originator()) else {
            debug!("[AlarmEvaluatorNode] unknown device {}, skipping", msg.originator());
            return Ok(NodeOutcome::Forward(msg));
        };

        let Some(profile) = self.lookup.find_profile(&device.profile_id) else {
            debug!("[AlarmEvaluatorNode] device {} has no profile, skipping", device.name);
            return Ok(NodeOutcome::Forward(msg));
        };

        if profile.alarm_rules.is_empty() {
            trace!("[AlarmEvaluatorNode] profile {} has no alarm rules", profile.name);
            return Ok(NodeOutcome::Forward(msg));
        }

        // Latest entry per key from this message.
        let mut snapshot: HashMap<String, TsKvEntry> = HashMap::new();
        for entry in msg.entries() {
            match snapshot.get(&entry.key) {
                Some(existing) if existing.ts > entry.ts => {}
                _ => {
                    snapshot.insert(entry.key.clone(), entry.clone());
                }
            }
        }

        self.evaluator.evaluate(&device, &profile, &snapshot);
        Ok(NodeOutcome::Forward(msg))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::alarms::{
        AlarmCondition, AlarmConditionFilter, AlarmRule, AlarmService, AlarmSeverity,
        InMemoryAlarmRepository,
    };
    use crate::devices::{Device, DeviceProfile, InMemoryDeviceRegistry};
    use crate::ids::DeviceId;
    use crate::telemetry::KvValue;

    fn node_with_rule() -> (AlarmEvaluatorNode, Device, Arc<AlarmService>) {
        let service = Arc::new(AlarmService::new(Arc::new(InMemoryAlarmRepository::new())));
        let evaluator = Arc::new(AlarmEvaluator::new(service.clone()));

        let rule = AlarmRule::new("High Temperature").with_create_condition(
            AlarmSeverity::Critical,
            AlarmCondition::simple(vec![AlarmConditionFilter::greater_than("temperature", 85.0)]),
        );
        let profile = DeviceProfile::new("thermostat").with_alarm_rule(rule);
        let device = Device::new("rack-1", profile.id);

        let registry = Arc::new(InMemoryDeviceRegistry::new());
        registry.add_profile(profile);
        registry.add_device(device.clone());

        (AlarmEvaluatorNode::new(registry, evaluator), device, service)
    }

    fn telemetry(device: &Device, temperature: f64) -> Message {
        Message::telemetry(
            device.id,
            format!(r#"{{"temperature": {temperature}}}"#),
            vec![TsKvEntry::new(0, "temperature", KvValue::Double(temperature))],
        )
    }

    #[test]
    fn evaluates_and_forwards() {
        let (mut node, device, service) = node_with_rule();

        assert_matches!(
            node.on_msg(telemetry(&device, 90.0)).unwrap(),
            NodeOutcome::Forward(_)
        );

        let alarms = service.find_by_originator(&device.id);
        assert_eq!(alarms.len(), 1);
        assert_eq!(alarms[0].severity, AlarmSeverity::Critical);
    }

    #[test]
    fn forwards_without_evaluating_below_threshold() {
        let (mut node, device, service) = node_with_rule();

        assert_matches!(
            node.on_msg(telemetry(&device, 20.0)).unwrap(),
            NodeOutcome::Forward(_)
        );
        assert!(service.find_by_originator(&device.id).is_empty());
    }

    #[test]
    fn unknown_device_forwards_without_alarm() {
        let (mut node, _, service) = node_with_rule();
        let stranger = DeviceId::random();

        let msg = Message::telemetry(
            stranger,
            r#"{"temperature": 99.0}"#,
            vec![TsKvEntry::new(0, "temperature", KvValue::Double(99.0))],
        );

        assert_matches!(node.on_msg(msg).unwrap(), NodeOutcome::Forward(_));
        assert!(service.find_all_active().is_empty());
    }

    #[test]
    fn untyped_message_skips_evaluation() {
        let (mut node, device, service) = node_with_rule();

        let msg = Message::new(
            crate::message::MessageType::PostTelemetry,
            device.id,
            r#"{"temperature": 99.0}"#,
        );

        assert_matches!(node.on_msg(msg).unwrap(), NodeOutcome::Forward(_));
        assert!(service.find_by_originator(&device.id).is_empty());
    }
}
