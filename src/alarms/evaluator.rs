//! The alarm evaluation engine.
//!
//! Consumes a device's latest-telemetry snapshot and evaluates every alarm
//! rule on its profile: severity-ordered create conditions (first match
//! wins), then the clear condition when nothing matched and an alarm is
//! still active.
//!
//! DURATION and REPEATING conditions keep per-(rule, device) state in an
//! evaluation context that resets as soon as the filters stop matching.
//! Malformed or missing telemetry values are non-matches, never errors.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, instrument, trace};

use super::model::AlarmSeverity;
use super::rule::{
    AlarmCondition, AlarmConditionFilter, AlarmConditionSpec, AlarmRule, FilterOperator,
    FilterValue,
};
use super::service::AlarmService;
use crate::devices::{Device, DeviceProfile};
use crate::ids::DeviceId;
use crate::telemetry::{KvValue, TsKvEntry};

/// Tolerance for floating-point equality of telemetry values.
const EPSILON: f64 = 1e-4;

/// Mutable per-(rule, device) evaluation state.
#[derive(Debug, Default)]
struct AlarmEvaluationContext {
    /// When the filters first matched, for DURATION conditions.
    first_match_ts: Option<i64>,
    /// Consecutive matching evaluations, for REPEATING conditions.
    match_count: u32,
}

impl AlarmEvaluationContext {
    fn reset(&mut self) {
        self.first_match_ts = None;
        self.match_count = 0;
    }
}

/// Evaluates alarm rules against telemetry snapshots.
pub struct AlarmEvaluator {
    alarms: Arc<AlarmService>,
    /// Context per (device, rule id). Touched only during one synchronous
    /// evaluation call; the mutex covers sharing across chain actors.
    contexts: Mutex<HashMap<(DeviceId, String), AlarmEvaluationContext>>,
}

impl AlarmEvaluator {
    pub fn new(alarms: Arc<AlarmService>) -> Self {
        Self {
            alarms,
            contexts: Mutex::new(HashMap::new()),
        }
    }

    pub fn alarm_service(&self) -> &Arc<AlarmService> {
        &self.alarms
    }

    /// Evaluate every alarm rule of the device's profile against the latest
    /// telemetry snapshot.
    #[instrument(skip_all, fields(device = %device.name))]
    pub fn evaluate(
        &self,
        device: &Device,
        profile: &DeviceProfile,
        latest: &HashMap<String, TsKvEntry>,
    ) {
        self.evaluate_at(device, profile, latest, crate::now_ms());
    }

    /// Evaluation with an explicit clock, so DURATION semantics are testable
    /// without sleeping.
    fn evaluate_at(
        &self,
        device: &Device,
        profile: &DeviceProfile,
        latest: &HashMap<String, TsKvEntry>,
        now_ms: i64,
    ) {
        if profile.alarm_rules.is_empty() {
            trace!("profile has no alarm rules");
            return;
        }

        debug!(
            "evaluating {} alarm rules against {} telemetry keys",
            profile.alarm_rules.len(),
            latest.len()
        );

        for rule in &profile.alarm_rules {
            self.evaluate_rule(device, rule, latest, now_ms);
        }
    }

    fn evaluate_rule(
        &self,
        device: &Device,
        rule: &AlarmRule,
        latest: &HashMap<String, TsKvEntry>,
        now_ms: i64,
    ) {
        // Highest severity first; the first satisfied condition wins.
        let mut matched_severity: Option<AlarmSeverity> = None;
        for (severity, condition) in rule.sorted_create_conditions() {
            if self.condition_matches(device, rule, condition, latest, now_ms) {
                trace!("create condition satisfied at {severity:?} for {}", rule.alarm_type);
                matched_severity = Some(*severity);
                break;
            }
        }

        if let Some(severity) = matched_severity {
            self.alarms
                .create_or_update(&device.id, &device.name, &rule.alarm_type, severity);
            return;
        }

        // No create condition matched: see whether the active alarm clears.
        let active = self
            .alarms
            .find_latest_by_originator_and_type(&device.id, &rule.alarm_type)
            .filter(|alarm| !alarm.is_cleared());

        if let (Some(alarm), Some(clear_condition)) = (active, rule.clear_condition.as_ref()) {
            if self.condition_matches(device, rule, clear_condition, latest, now_ms) {
                self.alarms.clear(&alarm.id);
            }
        }
    }

    fn condition_matches(
        &self,
        device: &Device,
        rule: &AlarmRule,
        condition: &AlarmCondition,
        latest: &HashMap<String, TsKvEntry>,
        now_ms: i64,
    ) -> bool {
        match condition.spec {
            AlarmConditionSpec::Simple => filters_match(&condition.filters, latest),
            AlarmConditionSpec::Duration { seconds } => {
                self.duration_matches(device, rule, condition, latest, seconds, now_ms)
            }
            AlarmConditionSpec::Repeating { count } => {
                self.repeating_matches(device, rule, condition, latest, count)
            }
        }
    }

    /// Filters must hold continuously for at least `seconds`. The first
    /// matching evaluation starts the clock; a non-match resets it.
    fn duration_matches(
        &self,
        device: &Device,
        rule: &AlarmRule,
        condition: &AlarmCondition,
        latest: &HashMap<String, TsKvEntry>,
        seconds: u64,
        now_ms: i64,
    ) -> bool {
        let matches_now = filters_match(&condition.filters, latest);

        let mut contexts = self.contexts.lock().expect("evaluation context lock poisoned");
        let context = contexts.entry((device.id, rule.id.clone())).or_default();

        if !matches_now {
            if context.first_match_ts.is_some() {
                trace!("duration evaluation interrupted for {}", rule.alarm_type);
            }
            context.first_match_ts = None;
            return false;
        }

        match context.first_match_ts {
            None => {
                context.first_match_ts = Some(now_ms);
                trace!("duration evaluation started for {}", rule.alarm_type);
                false
            }
            Some(first) => {
                let elapsed = now_ms - first;
                if elapsed >= (seconds as i64) * 1000 {
                    debug!(
                        "duration condition satisfied for {} after {}ms",
                        rule.alarm_type, elapsed
                    );
                    context.reset();
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Filters must match on `count` consecutive evaluations. A non-match
    /// resets the counter.
    fn repeating_matches(
        &self,
        device: &Device,
        rule: &AlarmRule,
        condition: &AlarmCondition,
        latest: &HashMap<String, TsKvEntry>,
        count: u32,
    ) -> bool {
        let matches_now = filters_match(&condition.filters, latest);

        let mut contexts = self.contexts.lock().expect("evaluation context lock poisoned");
        let context = contexts.entry((device.id, rule.id.clone())).or_default();

        if !matches_now {
            if context.match_count > 0 {
                trace!("repeating evaluation interrupted for {}", rule.alarm_type);
            }
            context.match_count = 0;
            return false;
        }

        context.match_count += 1;
        trace!(
            "repeating evaluation for {}: {}/{}",
            rule.alarm_type, context.match_count, count
        );

        if context.match_count >= count {
            context.reset();
            true
        } else {
            false
        }
    }

    /// Drop all evaluation state for a device, e.g. when it is deleted.
    pub fn clear_device_contexts(&self, device: &DeviceId) {
        self.contexts
            .lock()
            .expect("evaluation context lock poisoned")
            .retain(|(ctx_device, _), _| ctx_device != device);
    }
}

/// All filters must match (AND). An empty filter list never matches.
fn filters_match(filters: &[AlarmConditionFilter], latest: &HashMap<String, TsKvEntry>) -> bool {
    if filters.is_empty() {
        return false;
    }

    filters.iter().all(|filter| {
        // A missing key fails closed.
        latest
            .get(&filter.key)
            .is_some_and(|entry| filter_matches(entry, filter))
    })
}

/// Apply one filter to one telemetry entry, coercing by the entry's type.
///
/// A type mismatch is a non-match for the positive operators; the negated
/// operators (`NotEqual`, `NotContains`) therefore match on mismatch.
pub fn filter_matches(entry: &TsKvEntry, filter: &AlarmConditionFilter) -> bool {
    match filter.operator {
        FilterOperator::Equal => compare_equal(entry, &filter.value),
        FilterOperator::NotEqual => !compare_equal(entry, &filter.value),
        FilterOperator::GreaterThan => compare_numeric(entry, &filter.value, |v, t| v > t),
        FilterOperator::GreaterOrEqual => compare_numeric(entry, &filter.value, |v, t| v >= t),
        FilterOperator::LessThan => compare_numeric(entry, &filter.value, |v, t| v < t),
        FilterOperator::LessOrEqual => compare_numeric(entry, &filter.value, |v, t| v <= t),
        FilterOperator::Contains => compare_str(entry, &filter.value, |s, n| s.contains(n)),
        FilterOperator::NotContains => !compare_str(entry, &filter.value, |s, n| s.contains(n)),
        FilterOperator::StartsWith => compare_str(entry, &filter.value, |s, n| s.starts_with(n)),
        FilterOperator::EndsWith => compare_str(entry, &filter.value, |s, n| s.ends_with(n)),
    }
}

fn compare_equal(entry: &TsKvEntry, value: &FilterValue) -> bool {
    match (&entry.value, value) {
        (KvValue::Long(l), FilterValue::Number(n)) => (*l as f64 - n).abs() < EPSILON,
        (KvValue::Double(d), FilterValue::Number(n)) => (d - n).abs() < EPSILON,
        (KvValue::Str(s), FilterValue::Str(t)) => s == t,
        (KvValue::Bool(b), FilterValue::Bool(t)) => b == t,
        _ => false,
    }
}

fn compare_numeric(
    entry: &TsKvEntry,
    value: &FilterValue,
    op: impl Fn(f64, f64) -> bool,
) -> bool {
    let FilterValue::Number(threshold) = value else {
        return false;
    };
    entry.as_f64().is_some_and(|v| op(v, *threshold))
}

fn compare_str(
    entry: &TsKvEntry,
    value: &FilterValue,
    op: impl Fn(&str, &str) -> bool,
) -> bool {
    let FilterValue::Str(needle) = value else {
        return false;
    };
    entry.as_str().is_some_and(|s| op(s, needle))
}
