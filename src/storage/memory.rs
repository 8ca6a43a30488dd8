//! In-memory telemetry storage (no persistence).
//!
//! Reference backend used by tests and single-process deployments. All data
//! is lost on restart.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::trace;

use super::{StorageResult, TelemetryStorage};
use crate::ids::DeviceId;
use crate::telemetry::TsKvEntry;

#[derive(Debug, Clone)]
struct StoredRow {
    ts: i64,
    payload: String,
    entries: Vec<TsKvEntry>,
}

/// In-memory [`TelemetryStorage`] implementation.
#[derive(Default)]
pub struct MemoryStorage {
    rows: RwLock<HashMap<DeviceId, Vec<StoredRow>>>,
    latest: RwLock<HashMap<DeviceId, HashMap<String, TsKvEntry>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows for a device, used by tests and diagnostics.
    pub fn row_count(&self, device: &DeviceId) -> usize {
        self.rows
            .read()
            .expect("storage lock poisoned")
            .get(device)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Raw payload of the most recently saved row for a device.
    pub fn last_payload(&self, device: &DeviceId) -> Option<String> {
        self.rows
            .read()
            .expect("storage lock poisoned")
            .get(device)
            .and_then(|rows| rows.last())
            .map(|row| row.payload.clone())
    }
}

impl TelemetryStorage for MemoryStorage {
    fn save(
        &self,
        device: &DeviceId,
        ts: i64,
        payload: &str,
        entries: &[TsKvEntry],
    ) -> StorageResult<()> {
        trace!("saving {} entries for device {device}", entries.len());

        self.rows
            .write()
            .expect("storage lock poisoned")
            .entry(*device)
            .or_default()
            .push(StoredRow {
                ts,
                payload: payload.to_string(),
                entries: entries.to_vec(),
            });

        let mut latest = self.latest.write().expect("storage lock poisoned");
        let per_device = latest.entry(*device).or_default();
        for entry in entries {
            match per_device.get(&entry.key) {
                Some(existing) if existing.ts > entry.ts => {}
                _ => {
                    per_device.insert(entry.key.clone(), entry.clone());
                }
            }
        }

        Ok(())
    }

    fn query(
        &self,
        device: &DeviceId,
        key: &str,
        from_ts: i64,
        to_ts: i64,
    ) -> StorageResult<Vec<TsKvEntry>> {
        let rows = self.rows.read().expect("storage lock poisoned");

        let mut result: Vec<TsKvEntry> = rows
            .get(device)
            .map(|rows| {
                rows.iter()
                    .filter(|row| row.ts >= from_ts && row.ts <= to_ts)
                    .flat_map(|row| row.entries.iter())
                    .filter(|entry| entry.key == key)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        result.sort_by_key(|entry| entry.ts);
        Ok(result)
    }

    fn latest(&self, device: &DeviceId) -> StorageResult<HashMap<String, TsKvEntry>> {
        Ok(self
            .latest
            .read()
            .expect("storage lock poisoned")
            .get(device)
            .cloned()
            .unwrap_or_default())
    }
}
