//! The built-in rule node set.

pub mod alarm;
pub mod alarm_evaluator;
pub mod filter;
pub mod log;
pub mod save_telemetry;

pub use alarm::AlarmNode;
pub use alarm_evaluator::AlarmEvaluatorNode;
pub use filter::FilterNode;
pub use log::LogNode;
pub use save_telemetry::SaveTelemetryNode;
