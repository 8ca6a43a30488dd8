//! Telemetry storage contract.
//!
//! The rule engine treats storage as a fast local collaborator: calls happen
//! inside mailbox drains, so implementations must not block on slow I/O.
//! Anything slow belongs behind a buffering adapter outside the core.

pub mod memory;

use std::collections::HashMap;

use thiserror::Error;

use crate::ids::DeviceId;
use crate::telemetry::TsKvEntry;

pub use memory::MemoryStorage;

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage query failed: {0}")]
    QueryFailed(String),

    #[error("storage write failed: {0}")]
    WriteFailed(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Time-indexed key/value telemetry store.
///
/// Implementations must be `Send + Sync`; they are shared across mailbox
/// drain tasks. No transactional guarantees are required by the core.
pub trait TelemetryStorage: Send + Sync {
    /// Append one message worth of telemetry for a device.
    fn save(
        &self,
        device: &DeviceId,
        ts: i64,
        payload: &str,
        entries: &[TsKvEntry],
    ) -> StorageResult<()>;

    /// Entries for one key within `[from_ts, to_ts]`, oldest first.
    fn query(
        &self,
        device: &DeviceId,
        key: &str,
        from_ts: i64,
        to_ts: i64,
    ) -> StorageResult<Vec<TsKvEntry>>;

    /// Most recent entry per key for a device.
    fn latest(&self, device: &DeviceId) -> StorageResult<HashMap<String, TsKvEntry>>;
}
