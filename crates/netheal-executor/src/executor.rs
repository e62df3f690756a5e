//! Action executor
//!
//! Gates decisions, applies them through an `ActionDriver`, and owns the
//! lifecycle of every operation. Each resource has its own async lock, held
//! for the whole of execute/approve/reject/rollback, so at most one active
//! operation exists per resource while different resources proceed in
//! parallel.
//!
//! One deadline covers each call, from waiting on the lock to the driver
//! returning. Every attempt that misses it leaves a `failed` audit entry.

use crate::audit::{AuditEvent, AuditLog};
use crate::effects::{modeled_effect, ActionDriver, SimulatedDriver};
use crate::store::TelemetryStore;
use chrono::{DateTime, Utc};
use netheal_core::{
    Clock, Decision, EngineConfig, EngineError, Operation, OperationStatus, Result, SystemClock,
    TelemetryRecord,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::{error, info, warn};

pub struct Executor {
    store: Arc<TelemetryStore>,
    audit: Arc<AuditLog>,
    clock: Arc<dyn Clock>,
    driver: Arc<dyn ActionDriver>,
    auto_execute_threshold: f64,
    timeout: Duration,
    operations: RwLock<HashMap<String, Operation>>,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl Executor {
    pub fn new(store: Arc<TelemetryStore>, audit: Arc<AuditLog>, config: &EngineConfig) -> Self {
        Self {
            store,
            audit,
            clock: Arc::new(SystemClock),
            driver: Arc::new(SimulatedDriver),
            auto_execute_threshold: config.auto_execute_threshold,
            timeout: Duration::from_millis(config.execution_timeout_ms),
            operations: RwLock::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_driver(mut self, driver: Arc<dyn ActionDriver>) -> Self {
        self.driver = driver;
        self
    }

    pub fn store(&self) -> &Arc<TelemetryStore> {
        &self.store
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Execute (or simulate) a decision against a resource.
    ///
    /// Decisions that do not clear the auto-execute gate are recorded as
    /// pending and fail with `ApprovalRequired` carrying the operation id.
    pub async fn execute(&self, decision: &Decision, resource_id: &str, dry_run: bool) -> Result<Operation> {
        decision.validate()?;
        if decision.recommended_action.is_none() {
            return Err(EngineError::invalid("decision recommends no action"));
        }
        if resource_id.trim().is_empty() {
            return Err(EngineError::invalid("resource_id must not be empty"));
        }
        if !decision.parameters.matches(decision.recommended_action) {
            return Err(EngineError::invalid(format!(
                "parameters do not belong to action {}",
                decision.recommended_action
            )));
        }

        let deadline = self.deadline();
        let _guard = match self.lock_resource(resource_id, deadline).await {
            Ok(guard) => guard,
            Err(e) => {
                let now = self.clock.now();
                let failed = Operation::attempt(decision, resource_id, now).failed_attempt(e.to_string());
                self.commit(AuditEvent::Failed, &failed, Some(e.to_string()), now)?;
                error!(operation = %failed.id, resource = resource_id, error = %e, "execution timed out waiting for resource");
                return Err(e);
            }
        };
        let now = self.clock.now();
        let before = self.store.latest(resource_id).ok_or_else(|| {
            EngineError::invalid(format!("no telemetry recorded for {}", resource_id))
        })?;
        let attempt = Operation::attempt(decision, resource_id, now).with_before(before.clone());

        if dry_run {
            let after = modeled_effect(&attempt, &before, now);
            let operation = attempt.simulated().into_applied(after, now)?;
            self.commit(AuditEvent::Simulated, &operation, None, now)?;
            info!(operation = %operation.id, resource = resource_id, action = %operation.action, "dry run simulated");
            return Ok(operation);
        }

        if let Some(active) = self.active_operation_at(resource_id, now) {
            let reason = format!("resource busy with operation {}", active.id);
            let failed = attempt.failed_attempt(reason.clone());
            self.commit(AuditEvent::Failed, &failed, Some(reason), now)?;
            warn!(resource = resource_id, active = %active.id, "execution rejected, resource busy");
            return Err(EngineError::Conflict {
                resource_id: resource_id.to_string(),
                active_operation_id: active.id,
            });
        }

        if !decision.passes_gate(self.auto_execute_threshold) {
            let reason = format!(
                "confidence {:.2} does not clear auto-execute threshold {:.2}",
                decision.confidence, self.auto_execute_threshold
            );
            self.commit(AuditEvent::Proposed, &attempt, Some(reason.clone()), now)?;
            info!(operation = %attempt.id, resource = resource_id, "operation awaiting approval");
            return Err(EngineError::ApprovalRequired {
                operation_id: attempt.id,
                reason,
            });
        }

        self.apply(attempt, &before, AuditEvent::Applied, deadline).await
    }

    /// Apply a pending operation after human confirmation
    pub async fn approve(&self, operation_id: &str) -> Result<Operation> {
        let deadline = self.deadline();
        let waiting = self.operation(operation_id)?;
        let resource_id = waiting.resource_id.clone();
        let _guard = self.lock_or_record(&waiting, deadline).await?;

        let pending = self.operation(operation_id)?;
        if pending.status != OperationStatus::Pending {
            return Err(EngineError::invalid(format!(
                "operation {} is {}, only pending operations can be approved",
                operation_id, pending.status
            )));
        }

        // Live state may have moved on since the proposal
        let before = self
            .store
            .latest(&resource_id)
            .or_else(|| pending.before.clone())
            .ok_or_else(|| EngineError::invalid(format!("no telemetry recorded for {}", resource_id)))?;

        self.apply(pending.with_before(before.clone()), &before, AuditEvent::Approved, deadline).await
    }

    /// Close a pending operation without applying it
    pub async fn reject(&self, operation_id: &str, reason: &str) -> Result<Operation> {
        let waiting = self.operation(operation_id)?;
        let _guard = self.lock_or_record(&waiting, self.deadline()).await?;

        let pending = self.operation(operation_id)?;
        if pending.status != OperationStatus::Pending {
            return Err(EngineError::invalid(format!(
                "operation {} is {}, only pending operations can be rejected",
                operation_id, pending.status
            )));
        }

        let now = self.clock.now();
        let rejected = pending.into_failed(reason)?;
        self.commit(AuditEvent::Rejected, &rejected, Some(reason.to_string()), now)?;
        info!(operation = operation_id, "operation rejected");
        Ok(rejected)
    }

    /// Undo an applied operation inside its rollback window.
    ///
    /// Expiry is checked before confirmation.
    pub async fn rollback(&self, operation_id: &str, confirm: bool) -> Result<Operation> {
        let deadline = self.deadline();
        let waiting = self.operation(operation_id)?;
        let resource_id = waiting.resource_id.clone();
        let _guard = self.lock_or_record(&waiting, deadline).await?;

        let applied = self.operation(operation_id)?;
        if applied.simulated {
            return Err(EngineError::invalid(format!(
                "operation {} was a dry run, there is nothing to roll back",
                operation_id
            )));
        }
        if applied.status != OperationStatus::Applied {
            return Err(EngineError::invalid(format!(
                "operation {} is {}, only applied operations can be rolled back",
                operation_id, applied.status
            )));
        }

        let now = self.clock.now();
        if applied.rollback_expired(now) {
            let window_end = applied.rollback_deadline.unwrap_or(now);
            self.commit(AuditEvent::RollbackDenied, &applied, Some("rollback window closed".to_string()), now)?;
            warn!(operation = operation_id, deadline = %window_end, "rollback window closed");
            return Err(EngineError::RollbackExpired {
                operation_id: operation_id.to_string(),
                deadline: window_end,
            });
        }
        if !confirm {
            self.commit(AuditEvent::RollbackDenied, &applied, Some("confirmation required".to_string()), now)?;
            return Err(EngineError::ConfirmationRequired {
                operation_id: operation_id.to_string(),
            });
        }

        let before = applied
            .before
            .clone()
            .ok_or_else(|| EngineError::invalid(format!("operation {} has no before-snapshot", operation_id)))?;

        if let Err(e) = self.within("rollback", deadline, self.driver.revert(&applied)).await {
            self.commit(AuditEvent::Failed, &applied, Some(format!("rollback failed: {}", e)), now)?;
            error!(operation = operation_id, error = %e, "rollback failed");
            return Err(e);
        }

        let mutates = applied.action.mutates_network();
        let rolled_back = applied.into_rolled_back()?;
        self.commit(AuditEvent::RolledBack, &rolled_back, None, now)?;
        if mutates {
            self.store.restore(before)?;
        }
        info!(operation = operation_id, resource = %resource_id, "operation rolled back");
        Ok(rolled_back)
    }

    pub fn operation(&self, operation_id: &str) -> Result<Operation> {
        let operations = self.operations.read().unwrap_or_else(PoisonError::into_inner);
        operations
            .get(operation_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("operation {}", operation_id)))
    }

    /// Operations recorded for a resource, oldest first
    pub fn operations_for(&self, resource_id: &str) -> Vec<Operation> {
        let operations = self.operations.read().unwrap_or_else(PoisonError::into_inner);
        let mut found: Vec<Operation> = operations
            .values()
            .filter(|op| op.resource_id == resource_id)
            .cloned()
            .collect();
        found.sort_by_key(|op| op.created_at);
        found
    }

    pub fn active_operation(&self, resource_id: &str) -> Option<Operation> {
        self.active_operation_at(resource_id, self.clock.now())
    }

    /// Live snapshot of a resource
    pub fn current_state(&self, resource_id: &str) -> Result<TelemetryRecord> {
        self.store
            .latest(resource_id)
            .ok_or_else(|| EngineError::NotFound(format!("resource {}", resource_id)))
    }

    /// Run the driver, then record the outcome before touching live state.
    ///
    /// Anything that fails once the driver has been called is audited as
    /// `failed` before the error is returned.
    async fn apply(
        &self,
        pending: Operation,
        before: &TelemetryRecord,
        event: AuditEvent,
        deadline: Instant,
    ) -> Result<Operation> {
        let now = self.clock.now();
        let outcome = self
            .within("execute", deadline, self.driver.apply(&pending, before, now))
            .await
            .and_then(|after| {
                if pending.action.mutates_network() {
                    after.validate()?;
                }
                pending.clone().into_applied(after, now)
            });

        let applied = match outcome {
            Ok(applied) => applied,
            Err(e) => {
                let failed = pending.into_failed(e.to_string())?;
                self.commit(AuditEvent::Failed, &failed, Some(e.to_string()), now)?;
                error!(operation = %failed.id, error = %e, "operation failed");
                return Err(e);
            }
        };

        self.commit(event, &applied, None, now)?;
        if applied.action.mutates_network() {
            if let Some(after) = applied.after.clone() {
                self.store.ingest(after)?;
            }
        }
        info!(
            operation = %applied.id,
            resource = %applied.resource_id,
            action = %applied.action,
            driver = self.driver.name(),
            "operation applied"
        );
        Ok(applied)
    }

    fn active_operation_at(&self, resource_id: &str, now: DateTime<Utc>) -> Option<Operation> {
        let operations = self.operations.read().unwrap_or_else(PoisonError::into_inner);
        operations
            .values()
            .find(|op| op.resource_id == resource_id && op.is_active(now))
            .cloned()
    }

    /// Audit first, then index
    fn commit(&self, event: AuditEvent, operation: &Operation, note: Option<String>, now: DateTime<Utc>) -> Result<()> {
        self.audit.record(event, operation, note, now)?;
        let mut operations = self.operations.write().unwrap_or_else(PoisonError::into_inner);
        operations.insert(operation.id.clone(), operation.clone());
        Ok(())
    }

    fn deadline(&self) -> Instant {
        Instant::now() + self.timeout
    }

    async fn lock_resource(&self, resource_id: &str, deadline: Instant) -> Result<OwnedMutexGuard<()>> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(resource_id.to_string()).or_default().clone()
        };
        self.within("lock", deadline, async move { Ok(lock.lock_owned().await) }).await
    }

    /// Lock for an existing operation. A timeout is audited but leaves the
    /// operation index alone, since the holder of the lock may be changing it.
    async fn lock_or_record(&self, operation: &Operation, deadline: Instant) -> Result<OwnedMutexGuard<()>> {
        match self.lock_resource(&operation.resource_id, deadline).await {
            Ok(guard) => Ok(guard),
            Err(e) => {
                self.audit.record(AuditEvent::Failed, operation, Some(e.to_string()), self.clock.now())?;
                error!(operation = %operation.id, error = %e, "timed out waiting for resource");
                Err(e)
            }
        }
    }

    async fn within<T>(&self, what: &str, deadline: Instant, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout_at(deadline, fut).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Timeout {
                operation: what.to_string(),
                budget_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}
