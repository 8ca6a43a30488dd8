//! Alarm rules: when to create and when to clear an alarm.
//!
//! A rule maps alarm severities to create conditions (evaluated highest
//! severity first, first match wins) plus an optional clear condition.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::model::AlarmSeverity;

/// Comparison operator of a condition filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
}

/// The value a telemetry entry is compared against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterValue {
    Number(f64),
    Str(String),
    Bool(bool),
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        FilterValue::Number(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Number(value as f64)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Str(value.to_string())
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

/// A single `key operator value` predicate over the telemetry snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmConditionFilter {
    pub key: String,
    pub operator: FilterOperator,
    pub value: FilterValue,
}

impl AlarmConditionFilter {
    pub fn new(
        key: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<FilterValue>,
    ) -> Self {
        Self {
            key: key.into(),
            operator,
            value: value.into(),
        }
    }

    pub fn greater_than(key: impl Into<String>, value: f64) -> Self {
        Self::new(key, FilterOperator::GreaterThan, value)
    }

    pub fn less_than(key: impl Into<String>, value: f64) -> Self {
        Self::new(key, FilterOperator::LessThan, value)
    }

    pub fn equal(key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(key, FilterOperator::Equal, value)
    }
}

/// Timing semantics of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AlarmConditionSpec {
    /// Matches as soon as all filters match.
    Simple,
    /// Filters must match continuously for at least this long.
    Duration { seconds: u64 },
    /// Filters must match on this many consecutive evaluations.
    Repeating { count: u32 },
}

/// A create or clear condition: AND-combined filters plus timing semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmCondition {
    pub spec: AlarmConditionSpec,
    pub filters: Vec<AlarmConditionFilter>,
}

impl AlarmCondition {
    pub fn simple(filters: Vec<AlarmConditionFilter>) -> Self {
        Self {
            spec: AlarmConditionSpec::Simple,
            filters,
        }
    }

    pub fn duration(seconds: u64, filters: Vec<AlarmConditionFilter>) -> Self {
        Self {
            spec: AlarmConditionSpec::Duration { seconds },
            filters,
        }
    }

    pub fn repeating(count: u32, filters: Vec<AlarmConditionFilter>) -> Self {
        Self {
            spec: AlarmConditionSpec::Repeating { count },
            filters,
        }
    }
}

/// A per-profile alarm specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmRule {
    /// Stable key for the per-(rule, device) evaluation context.
    pub id: String,
    /// Alarm type created by this rule, e.g. "High Temperature".
    pub alarm_type: String,
    /// Create conditions keyed by severity. `BTreeMap` iteration follows
    /// severity order, so the most severe condition is evaluated first.
    pub create_conditions: BTreeMap<AlarmSeverity, AlarmCondition>,
    pub clear_condition: Option<AlarmCondition>,
}

impl AlarmRule {
    pub fn new(alarm_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            alarm_type: alarm_type.into(),
            create_conditions: BTreeMap::new(),
            clear_condition: None,
        }
    }

    pub fn with_create_condition(
        mut self,
        severity: AlarmSeverity,
        condition: AlarmCondition,
    ) -> Self {
        self.create_conditions.insert(severity, condition);
        self
    }

    pub fn with_clear_condition(mut self, condition: AlarmCondition) -> Self {
        self.clear_condition = Some(condition);
        self
    }

    /// Create conditions from highest to lowest severity.
    pub fn sorted_create_conditions(
        &self,
    ) -> impl Iterator<Item = (&AlarmSeverity, &AlarmCondition)> {
        self.create_conditions.iter()
    }
}
