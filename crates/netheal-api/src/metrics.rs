//! Prometheus counters served on `/metrics`
use prometheus::{register_int_counter_vec_with_registry, Encoder, IntCounterVec, Registry, TextEncoder};

pub struct ApiMetrics {
    pub decisions_total: IntCounterVec,
    pub operations_total: IntCounterVec,
    pub errors_total: IntCounterVec,
    registry: Registry,
}

impl ApiMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let decisions_total = register_int_counter_vec_with_registry!(
            "netheal_decisions_total",
            "Decisions produced, by recommended action",
            &["action"],
            registry
        )?;

        let operations_total = register_int_counter_vec_with_registry!(
            "netheal_operations_total",
            "Operation state changes, by resulting status",
            &["status"],
            registry
        )?;

        let errors_total = register_int_counter_vec_with_registry!(
            "netheal_errors_total",
            "Failed requests, by error code",
            &["code"],
            registry
        )?;

        Ok(Self { decisions_total, operations_total, errors_total, registry })
    }

    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).to_string())
    }
}
