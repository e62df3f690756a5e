//! Audit trail
//!
//! Append-only, hash-chained record of every operation attempt and status
//! transition. Entries are never edited; a rollback is a new entry.

use chrono::{DateTime, Utc};
use netheal_core::{EngineError, Operation, OperationStatus, RemediationAction, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

/// `prev_hash` of the first entry
pub const GENESIS_HASH: &str = "blake3:genesis";

/// What happened to the operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    /// Recorded as pending, awaiting approval
    Proposed,
    /// Auto-executed
    Applied,
    /// Dry run
    Simulated,
    /// Pending operation approved and applied
    Approved,
    /// Pending operation rejected
    Rejected,
    RolledBack,
    RollbackDenied,
    Failed,
}

impl AuditEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEvent::Proposed => "proposed",
            AuditEvent::Applied => "applied",
            AuditEvent::Simulated => "simulated",
            AuditEvent::Approved => "approved",
            AuditEvent::Rejected => "rejected",
            AuditEvent::RolledBack => "rolled_back",
            AuditEvent::RollbackDenied => "rollback_denied",
            AuditEvent::Failed => "failed",
        }
    }
}

impl std::fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An audit log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Position in the log, starting at 1
    pub seq: u64,

    pub recorded_at: DateTime<Utc>,

    pub event: AuditEvent,

    pub operation_id: String,

    pub resource_id: String,

    pub action: RemediationAction,

    pub status: OperationStatus,

    /// Free-form detail (denial reason, rejection note)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    /// The operation as it was when this entry was written
    pub operation: Operation,

    pub prev_hash: String,

    pub entry_hash: String,
}

impl AuditEntry {
    fn new(
        seq: u64,
        event: AuditEvent,
        operation: &Operation,
        note: Option<String>,
        recorded_at: DateTime<Utc>,
        prev_hash: String,
    ) -> Result<Self> {
        let mut entry = Self {
            seq,
            recorded_at,
            event,
            operation_id: operation.id.clone(),
            resource_id: operation.resource_id.clone(),
            action: operation.action,
            status: operation.status,
            note,
            operation: operation.clone(),
            prev_hash,
            entry_hash: String::new(),
        };
        entry.entry_hash = entry.compute_hash()?;
        Ok(entry)
    }

    /// blake3 over the entry serialized with an empty `entry_hash`
    pub fn compute_hash(&self) -> Result<String> {
        let mut unsealed = self.clone();
        unsealed.entry_hash.clear();
        let bytes = serde_json::to_vec(&unsealed)?;
        Ok(format!("blake3:{}", blake3::hash(&bytes)))
    }
}

/// Filter for `AuditLog::query`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditQuery {
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub until: Option<DateTime<Utc>>,
    /// Keep only the most recent N matches
    #[serde(default)]
    pub limit: Option<usize>,
}

impl AuditQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_resource(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, entry: &AuditEntry) -> bool {
        self.resource_id.as_deref().map_or(true, |r| entry.resource_id == r)
            && self.since.map_or(true, |s| entry.recorded_at >= s)
            && self.until.map_or(true, |u| entry.recorded_at <= u)
    }
}

struct Inner {
    entries: Vec<AuditEntry>,
    sink: Option<File>,
}

/// Audit log collector, optionally backed by a JSON Lines file
pub struct AuditLog {
    inner: Mutex<Inner>,
    path: Option<PathBuf>,
}

impl AuditLog {
    /// Memory-only log
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(Inner { entries: Vec::new(), sink: None }),
            path: None,
        }
    }

    /// Open (or create) a JSONL log, loading and verifying existing entries
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut entries = Vec::new();

        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            for (n, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let entry: AuditEntry = serde_json::from_str(&line).map_err(|e| {
                    EngineError::Storage(format!("{} line {}: {}", path.display(), n + 1, e))
                })?;
                entries.push(entry);
            }
            verify_entries(&entries)?;
        }

        let sink = OpenOptions::new().create(true).append(true).open(&path)?;
        info!(path = %path.display(), entries = entries.len(), "audit log opened");

        Ok(Self {
            inner: Mutex::new(Inner { entries, sink: Some(sink) }),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append an entry for the operation's current state
    pub fn record(
        &self,
        event: AuditEvent,
        operation: &Operation,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<AuditEntry> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        let (seq, prev_hash) = match inner.entries.last() {
            Some(last) => (last.seq + 1, last.entry_hash.clone()),
            None => (1, GENESIS_HASH.to_string()),
        };
        let entry = AuditEntry::new(seq, event, operation, note, now, prev_hash)?;

        if let Some(sink) = inner.sink.as_mut() {
            let mut line = serde_json::to_string(&entry)?;
            line.push('\n');
            sink.write_all(line.as_bytes())?;
            sink.flush()?;
        }

        debug!(seq, event = %event, operation = %operation.id, "audit entry recorded");
        inner.entries.push(entry.clone());
        Ok(entry)
    }

    /// Get all entries
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).entries.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Matching entries in chronological order.
    ///
    /// With a limit, the most recent matches are kept.
    pub fn query(&self, query: &AuditQuery) -> Vec<AuditEntry> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let matched: Vec<&AuditEntry> = inner.entries.iter().filter(|e| query.matches(e)).collect();
        let skip = query
            .limit
            .map(|limit| matched.len().saturating_sub(limit))
            .unwrap_or(0);
        matched.into_iter().skip(skip).cloned().collect()
    }

    /// Get entries for a specific operation
    pub fn entries_for_operation(&self, operation_id: &str) -> Vec<AuditEntry> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner
            .entries
            .iter()
            .filter(|e| e.operation_id == operation_id)
            .cloned()
            .collect()
    }

    /// Check sequence numbers and the hash chain end to end
    pub fn verify_chain(&self) -> Result<()> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        verify_entries(&inner.entries)
    }

    /// Export to JSON Lines
    pub fn to_jsonl(&self) -> String {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner
            .entries
            .iter()
            .filter_map(|e| serde_json::to_string(e).ok())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Get statistics
    pub fn stats(&self) -> AuditStats {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut by_event: BTreeMap<AuditEvent, usize> = BTreeMap::new();
        for entry in &inner.entries {
            *by_event.entry(entry.event).or_default() += 1;
        }
        let count = |event| by_event.get(&event).copied().unwrap_or(0);

        let auto_executed = count(AuditEvent::Applied);
        let approved = count(AuditEvent::Approved);
        let executed = auto_executed + approved;

        AuditStats {
            total: inner.entries.len(),
            auto_executed,
            approved,
            simulated: count(AuditEvent::Simulated),
            rolled_back: count(AuditEvent::RolledBack),
            failed: count(AuditEvent::Failed),
            auto_execute_rate: if executed > 0 { auto_executed as f64 / executed as f64 } else { 0.0 },
            by_event: by_event.into_iter().map(|(k, v)| (k.as_str().to_string(), v)).collect(),
        }
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::in_memory()
    }
}

fn verify_entries(entries: &[AuditEntry]) -> Result<()> {
    let mut prev = GENESIS_HASH.to_string();
    for (i, entry) in entries.iter().enumerate() {
        let expected_seq = i as u64 + 1;
        if entry.seq != expected_seq {
            return Err(EngineError::Storage(format!(
                "audit entry {} has seq {}, expected {}",
                i, entry.seq, expected_seq
            )));
        }
        if entry.prev_hash != prev {
            return Err(EngineError::Storage(format!("audit chain broken at seq {}", entry.seq)));
        }
        if entry.compute_hash()? != entry.entry_hash {
            return Err(EngineError::Storage(format!("audit entry {} was modified", entry.seq)));
        }
        prev = entry.entry_hash.clone();
    }
    Ok(())
}

/// Statistics about audit entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditStats {
    pub total: usize,
    pub auto_executed: usize,
    pub approved: usize,
    pub simulated: usize,
    pub rolled_back: usize,
    pub failed: usize,
    /// Share of real executions that needed no approval
    pub auto_execute_rate: f64,
    pub by_event: BTreeMap<String, usize>,
}
