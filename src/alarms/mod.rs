//! Alarm domain: model, rules, repository, service and evaluation engine.
//!
//! ```text
//! AlarmEvaluatorNode ──► AlarmEvaluator ──► AlarmService ──► AlarmRepository
//!                                              │
//!                                              └──► broadcast<AlarmUpdate>
//! ```

pub mod evaluator;
pub mod model;
pub mod repository;
pub mod rule;
pub mod service;

pub use evaluator::AlarmEvaluator;
pub use model::{Alarm, AlarmSeverity, AlarmStatus};
pub use repository::{AlarmRepository, InMemoryAlarmRepository};
pub use rule::{AlarmCondition, AlarmConditionFilter, AlarmConditionSpec, AlarmRule, FilterOperator};
pub use service::{AlarmService, AlarmUpdate, AlarmUpdateKind};
