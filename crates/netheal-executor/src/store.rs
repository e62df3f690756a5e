//! Telemetry store
//!
//! Keeps the history of snapshots per resource. The last snapshot for a
//! resource is its live state.

use netheal_core::{Result, TelemetryRecord};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::debug;

#[derive(Debug, Default)]
pub struct TelemetryStore {
    history: RwLock<HashMap<String, Vec<TelemetryRecord>>>,
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from a batch of records, in order
    pub fn from_records(records: impl IntoIterator<Item = TelemetryRecord>) -> Result<Self> {
        let store = Self::new();
        for record in records {
            store.ingest(record)?;
        }
        Ok(store)
    }

    /// Validate and append a record; it becomes the resource's live state
    pub fn ingest(&self, record: TelemetryRecord) -> Result<()> {
        record.validate()?;
        let resource_id = record.resource_id()?.to_string();
        debug!(resource = %resource_id, status = ?record.status, "telemetry ingested");

        let mut history = self.history.write().unwrap_or_else(PoisonError::into_inner);
        history.entry(resource_id).or_default().push(record);
        Ok(())
    }

    /// Make `snapshot` the live state again, e.g. after a rollback
    pub fn restore(&self, snapshot: TelemetryRecord) -> Result<()> {
        self.ingest(snapshot)
    }

    pub fn latest(&self, resource_id: &str) -> Option<TelemetryRecord> {
        let history = self.history.read().unwrap_or_else(PoisonError::into_inner);
        history.get(resource_id).and_then(|h| h.last().cloned())
    }

    pub fn history(&self, resource_id: &str) -> Vec<TelemetryRecord> {
        let history = self.history.read().unwrap_or_else(PoisonError::into_inner);
        history.get(resource_id).cloned().unwrap_or_default()
    }

    pub fn resources(&self) -> Vec<String> {
        let history = self.history.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<String> = history.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netheal_core::EngineError;

    #[test]
    fn test_latest_is_live_state() {
        let store = TelemetryStore::new();
        store.ingest(TelemetryRecord::ran("cell-A01").with_latency(48.0)).unwrap();
        store.ingest(TelemetryRecord::ran("cell-A01").with_latency(310.0).incident()).unwrap();

        let latest = store.latest("cell-A01").unwrap();
        assert_eq!(latest.latency_ms, 310.0);
        assert_eq!(store.history("cell-A01").len(), 2);
        assert!(store.latest("cell-Z99").is_none());
    }

    #[test]
    fn test_rejects_invalid_records() {
        let store = TelemetryStore::new();
        let result = store.ingest(TelemetryRecord::ran("cell-A01").with_packet_loss(140.0));
        assert!(matches!(result, Err(EngineError::InvalidInput(_))));
        assert!(store.resources().is_empty());
    }
}
