//! End-to-end pipeline tests: transport payload to storage rows and alarms

use pretty_assertions::assert_eq;
use ruleflow::alarms::{AlarmCondition, AlarmConditionFilter, AlarmRule, AlarmSeverity, AlarmUpdateKind};
use ruleflow::config::PipelineConfig;
use ruleflow::devices::{Device, DeviceProfile};
use ruleflow::rules::nodes::{FilterNode, SaveTelemetryNode};
use ruleflow::rules::RuleChain;
use ruleflow::TelemetryPipeline;

use super::helpers::{init_tracing, wait_for};

fn temperature_profile() -> DeviceProfile {
    let rule = AlarmRule::new("High Temperature")
        .with_create_condition(
            AlarmSeverity::Critical,
            AlarmCondition::simple(vec![AlarmConditionFilter::greater_than("temperature", 85.0)]),
        )
        .with_create_condition(
            AlarmSeverity::Warning,
            AlarmCondition::simple(vec![AlarmConditionFilter::greater_than("temperature", 75.0)]),
        )
        .with_clear_condition(AlarmCondition::simple(vec![AlarmConditionFilter::less_than(
            "temperature",
            75.0,
        )]));

    DeviceProfile::new("thermostat").with_alarm_rule(rule)
}

#[tokio::test(flavor = "multi_thread")]
async fn telemetry_flows_to_storage_and_alarms() {
    init_tracing();
    let pipeline = TelemetryPipeline::new(PipelineConfig::default()).unwrap();

    let chain = pipeline.default_chain();
    pipeline.register_chain(chain).unwrap();

    let profile = temperature_profile();
    let device = Device::new("rack-1", profile.id);
    pipeline.add_profile(profile);
    pipeline.register_device(device.clone()).unwrap();

    let mut updates = pipeline.alarms().subscribe();

    pipeline.submit_telemetry(&device.id, r#"{"temperature": 90.0, "humidity": 40}"#);

    let storage = pipeline.storage().clone();
    assert!(wait_for(|| storage.row_count(&device.id) == 1).await);

    let alarms = pipeline.alarms().clone();
    assert!(wait_for(|| alarms.find_by_originator(&device.id).len() == 1).await);
    let alarm = &alarms.find_by_originator(&device.id)[0];
    assert_eq!(alarm.severity, AlarmSeverity::Critical);
    assert_eq!(alarm.alarm_type, "High Temperature");
    assert_eq!(updates.recv().await.unwrap().kind, AlarmUpdateKind::Created);

    // Cooling below the clear threshold clears the alarm.
    pipeline.submit_telemetry(&device.id, r#"{"temperature": 20.0}"#);
    assert!(wait_for(|| alarms.find_all_active().is_empty()).await);
    assert_eq!(updates.recv().await.unwrap().kind, AlarmUpdateKind::Cleared);
    assert_eq!(storage.row_count(&device.id), 2);

    pipeline.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn profile_default_chain_overrides_root() {
    init_tracing();
    let pipeline = TelemetryPipeline::new(PipelineConfig::default()).unwrap();

    // Root chain would save everything; the profile routes to a filtering
    // chain instead.
    pipeline.register_chain(pipeline.default_chain()).unwrap();

    let filtering = RuleChain::new("filtered")
        .add_node(FilterNode::new("temperature", 50.0))
        .add_node(SaveTelemetryNode::new(pipeline.storage().clone()));
    let filtering_id = pipeline.register_chain(filtering).unwrap();

    let profile = DeviceProfile::new("picky").with_default_rule_chain(filtering_id);
    let device = Device::new("sensor-7", profile.id);
    pipeline.add_profile(profile);
    pipeline.register_device(device.clone()).unwrap();

    let storage = pipeline.storage().clone();

    pipeline.submit_telemetry(&device.id, r#"{"temperature": 60.0}"#);
    assert!(wait_for(|| storage.row_count(&device.id) == 1).await);

    // Below the filter threshold: stopped before the save node.
    pipeline.submit_telemetry(&device.id, r#"{"temperature": 40.0}"#);
    pipeline.submit_telemetry(&device.id, r#"{"temperature": 70.0}"#);
    assert!(wait_for(|| storage.row_count(&device.id) == 2).await);
    assert_eq!(storage.row_count(&device.id), 2);

    pipeline.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn repeated_highs_escalate_once_per_severity() {
    init_tracing();
    let pipeline = TelemetryPipeline::new(PipelineConfig::default()).unwrap();
    pipeline.register_chain(pipeline.default_chain()).unwrap();

    let profile = temperature_profile();
    let device = Device::new("rack-2", profile.id);
    pipeline.add_profile(profile);
    pipeline.register_device(device.clone()).unwrap();

    let alarms = pipeline.alarms().clone();

    // Warning first, then escalation to critical on the same alarm.
    pipeline.submit_telemetry(&device.id, r#"{"temperature": 80.0}"#);
    assert!(
        wait_for(|| {
            alarms
                .find_by_originator(&device.id)
                .first()
                .is_some_and(|alarm| alarm.severity == AlarmSeverity::Warning)
        })
        .await
    );

    pipeline.submit_telemetry(&device.id, r#"{"temperature": 90.0}"#);
    assert!(
        wait_for(|| {
            alarms
                .find_by_originator(&device.id)
                .first()
                .is_some_and(|alarm| alarm.severity == AlarmSeverity::Critical)
        })
        .await
    );

    // Still exactly one alarm for the (device, type) pair.
    assert_eq!(alarms.find_by_originator(&device.id).len(), 1);

    pipeline.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_device_and_unregistered_profile_are_rejected() {
    init_tracing();
    let pipeline = TelemetryPipeline::new(PipelineConfig::default()).unwrap();
    pipeline.register_chain(pipeline.default_chain()).unwrap();

    // No profile added for this device.
    let orphan = Device::new("orphan", ruleflow::ids::ProfileId::random());
    assert!(pipeline.register_device(orphan.clone()).is_err());

    // Telemetry for an unregistered device is dropped, not an error.
    pipeline.submit_telemetry(&orphan.id, r#"{"temperature": 99.0}"#);

    let storage = pipeline.storage().clone();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(storage.row_count(&orphan.id), 0);

    pipeline.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_stops_routing_without_errors() {
    init_tracing();
    let pipeline = TelemetryPipeline::new(PipelineConfig::default()).unwrap();
    pipeline.register_chain(pipeline.default_chain()).unwrap();

    let profile = DeviceProfile::new("plain");
    let device = Device::new("rack-3", profile.id);
    pipeline.add_profile(profile);
    pipeline.register_device(device.clone()).unwrap();

    pipeline.submit_telemetry(&device.id, r#"{"temperature": 10.0}"#);
    let storage = pipeline.storage().clone();
    assert!(wait_for(|| storage.row_count(&device.id) == 1).await);

    pipeline.shutdown().await;

    // Post-shutdown submissions are silently dropped.
    pipeline.submit_telemetry(&device.id, r#"{"temperature": 11.0}"#);
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert_eq!(storage.row_count(&device.id), 1);

    // Shutdown twice is fine.
    pipeline.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn remove_device_stops_its_actor() {
    init_tracing();
    let pipeline = TelemetryPipeline::new(PipelineConfig::default()).unwrap();
    pipeline.register_chain(pipeline.default_chain()).unwrap();

    let profile = DeviceProfile::new("plain");
    let device = Device::new("rack-4", profile.id);
    pipeline.add_profile(profile);
    pipeline.register_device(device.clone()).unwrap();

    pipeline.submit_telemetry(&device.id, r#"{"temperature": 10.0}"#);
    let storage = pipeline.storage().clone();
    assert!(wait_for(|| storage.row_count(&device.id) == 1).await);

    pipeline.remove_device(&device.id);
    pipeline.submit_telemetry(&device.id, r#"{"temperature": 11.0}"#);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(storage.row_count(&device.id), 1);

    pipeline.shutdown().await;
}
