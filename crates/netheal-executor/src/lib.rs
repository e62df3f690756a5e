//! NetHeal Executor: acting on decisions, safely
//!
//! ```text
//! Decision → gate ─┬→ dry run ──────────→ simulated Operation
//!                  ├→ auto-execute ─────→ ActionDriver → applied Operation
//!                  └→ pending ─ approve → ActionDriver → applied Operation
//!                               reject ─→ failed Operation
//!
//! applied Operation ─ rollback (within window, confirmed) → rolled_back
//!
//! every step ─→ AuditLog (append-only, hash-chained)
//! ```

pub mod audit;
pub mod effects;
pub mod executor;
pub mod pipeline;
pub mod store;

pub use audit::{AuditEntry, AuditEvent, AuditLog, AuditQuery, AuditStats, GENESIS_HASH};
pub use effects::{modeled_effect, ActionDriver, SimulatedDriver};
pub use executor::Executor;
pub use pipeline::{IncidentOutcome, IncidentPipeline};
pub use store::TelemetryStore;
