//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `bridge_balance_mutations_total` - Successful credits and debits
//! - `bridge_swaps_recorded_total` - New swap claims recorded
//! - `bridge_swap_checks_failed_total` - `check_swap` calls that did not match
//! - `bridge_unlocks_total` - `unlock_asset` calls that advanced a watermark
//! - `bridge_rejected_operations_total` - Operations refused with a caller error
//! - `bridge_swaps_stored` - Swap claims currently on record
//! - `bridge_operation_duration_seconds` - Actor handling latency

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Registry};
use std::sync::Arc;

/// Metrics collector
///
/// Each collector owns its own registry, so several bridges can live in one
/// process (tests do this).
#[derive(Clone)]
pub struct Metrics {
    /// Successful balance mutations
    pub balance_mutations: IntCounter,

    /// New swap claims
    pub swaps_recorded: IntCounter,

    /// Failed swap checks
    pub swap_checks_failed: IntCounter,

    /// Unlocks that advanced a pool
    pub unlocks: IntCounter,

    /// Caller errors
    pub rejected_operations: IntCounter,

    /// Swap claims on record
    pub swaps_stored: IntGauge,

    /// Handling latency
    pub operation_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let balance_mutations = IntCounter::new(
            "bridge_balance_mutations_total",
            "Total successful balance credits and debits",
        )?;
        registry.register(Box::new(balance_mutations.clone()))?;

        let swaps_recorded = IntCounter::new(
            "bridge_swaps_recorded_total",
            "Total new swap claims recorded",
        )?;
        registry.register(Box::new(swaps_recorded.clone()))?;

        let swap_checks_failed = IntCounter::new(
            "bridge_swap_checks_failed_total",
            "Total swap checks that did not match the record",
        )?;
        registry.register(Box::new(swap_checks_failed.clone()))?;

        let unlocks = IntCounter::new(
            "bridge_unlocks_total",
            "Total unlocks that advanced a vesting pool",
        )?;
        registry.register(Box::new(unlocks.clone()))?;

        let rejected_operations = IntCounter::new(
            "bridge_rejected_operations_total",
            "Total operations rejected with a caller error",
        )?;
        registry.register(Box::new(rejected_operations.clone()))?;

        let swaps_stored = IntGauge::new("bridge_swaps_stored", "Swap claims on record")?;
        registry.register(Box::new(swaps_stored.clone()))?;

        let operation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "bridge_operation_duration_seconds",
                "Histogram of actor handling latencies",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.010, 0.050, 0.100, 0.500]),
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        Ok(Self {
            balance_mutations,
            swaps_recorded,
            swap_checks_failed,
            unlocks,
            rejected_operations,
            swaps_stored,
            operation_duration,
            registry,
        })
    }

    /// Record a credit or debit
    pub fn record_balance_mutation(&self) {
        self.balance_mutations.inc();
    }

    /// Record a new swap claim and the resulting store size
    pub fn record_swap_recorded(&self, stored: usize) {
        self.swaps_recorded.inc();
        self.set_swaps_stored(stored);
    }

    /// Record a failed swap check
    pub fn record_swap_check_failed(&self) {
        self.swap_checks_failed.inc();
    }

    /// Record an unlock that advanced a watermark
    pub fn record_unlock(&self) {
        self.unlocks.inc();
    }

    /// Record a rejected operation
    pub fn record_rejected(&self) {
        self.rejected_operations.inc();
    }

    /// Set the stored-swaps gauge
    pub fn set_swaps_stored(&self, stored: usize) {
        self.swaps_stored.set(stored as i64);
    }

    /// Record handling duration
    pub fn record_operation_duration(&self, duration_seconds: f64) {
        self.operation_duration.observe(duration_seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.balance_mutations.get(), 0);
        assert_eq!(metrics.swaps_stored.get(), 0);
    }

    #[test]
    fn test_independent_registries() {
        let first = Metrics::new().unwrap();
        let second = Metrics::new().unwrap();

        first.record_balance_mutation();
        assert_eq!(first.balance_mutations.get(), 1);
        assert_eq!(second.balance_mutations.get(), 0);
    }

    #[test]
    fn test_record_swap_recorded() {
        let metrics = Metrics::new().unwrap();
        metrics.record_swap_recorded(1);
        metrics.record_swap_recorded(2);
        assert_eq!(metrics.swaps_recorded.get(), 2);
        assert_eq!(metrics.swaps_stored.get(), 2);
    }

    #[test]
    fn test_registry_exports_all_families() {
        let metrics = Metrics::new().unwrap();
        metrics.record_operation_duration(0.002);

        let names: Vec<String> = metrics
            .registry()
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"bridge_unlocks_total".to_string()));
        assert!(names.contains(&"bridge_operation_duration_seconds".to_string()));
        assert_eq!(names.len(), 7);
    }
}
