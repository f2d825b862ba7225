//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the ledger.
//!
//! # Metrics
//!
//! - `ledger_stock_movements_total` - Stock movements committed
//! - `ledger_token_transactions_total` - Token transactions committed
//! - `ledger_orders_total` - Orders created
//! - `ledger_insufficient_resource_total` - Rejected stock/token mutations
//! - `ledger_mutation_duration_seconds` - Atomic-unit latencies

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};
use std::sync::Arc;

/// Metrics collector
///
/// Collectors are registered against a per-instance registry so multiple
/// ledgers (tests, embedded use) never collide on the process-global one.
#[derive(Clone)]
pub struct Metrics {
    /// Total stock movements committed
    pub stock_movements_total: IntCounter,

    /// Total token transactions committed
    pub token_transactions_total: IntCounter,

    /// Total orders created
    pub orders_total: IntCounter,

    /// Mutations rejected for insufficient stock or balance
    pub insufficient_resource_total: IntCounter,

    /// Atomic-unit duration histogram
    pub mutation_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let stock_movements_total = IntCounter::new(
            "ledger_stock_movements_total",
            "Stock movements committed",
        )?;
        registry.register(Box::new(stock_movements_total.clone()))?;

        let token_transactions_total = IntCounter::new(
            "ledger_token_transactions_total",
            "Token transactions committed",
        )?;
        registry.register(Box::new(token_transactions_total.clone()))?;

        let orders_total = IntCounter::new("ledger_orders_total", "Orders created")?;
        registry.register(Box::new(orders_total.clone()))?;

        let insufficient_resource_total = IntCounter::new(
            "ledger_insufficient_resource_total",
            "Mutations rejected for insufficient stock or balance",
        )?;
        registry.register(Box::new(insufficient_resource_total.clone()))?;

        let mutation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_mutation_duration_seconds",
                "Atomic-unit latencies",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(mutation_duration.clone()))?;

        Ok(Self {
            stock_movements_total,
            token_transactions_total,
            orders_total,
            insufficient_resource_total,
            mutation_duration,
            registry,
        })
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("stock_movements_total", &self.stock_movements_total.get())
            .field("token_transactions_total", &self.token_transactions_total.get())
            .field("orders_total", &self.orders_total.get())
            .finish()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.stock_movements_total.get(), 0);
        assert_eq!(metrics.orders_total.get(), 0);
    }

    #[test]
    fn test_counters() {
        let metrics = Metrics::new().unwrap();
        metrics.stock_movements_total.inc();
        metrics.stock_movements_total.inc();
        assert_eq!(metrics.stock_movements_total.get(), 2);

        metrics.insufficient_resource_total.inc();
        assert_eq!(metrics.insufficient_resource_total.get(), 1);
    }

    #[test]
    fn test_two_instances_do_not_collide() {
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.orders_total.inc();
        assert_eq!(b.orders_total.get(), 0);
    }
}
