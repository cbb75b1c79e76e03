//! Prometheus metrics for the controller
//!
//! - `groupsync_reconciliations_total{result}` - reconcile passes by outcome
//! - `groupsync_reconciliation_duration_seconds` - duration of reconcile passes
//! - `groupsync_groups_synced_total{provider}` - Groups created or updated

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

pub type SharedMetrics = Arc<ControllerMetrics>;

pub struct ControllerMetrics {
    registry: Registry,
    reconciliations_total: IntCounterVec,
    reconciliation_duration: Histogram,
    groups_synced_total: IntCounterVec,
}

/// Create the metrics registry with every controller metric registered
pub fn create_metrics() -> Result<SharedMetrics, prometheus::Error> {
    let registry = Registry::new();

    let reconciliations_total = IntCounterVec::new(
        Opts::new(
            "groupsync_reconciliations_total",
            "Total number of GroupSync reconciliations",
        ),
        &["result"],
    )?;
    let reconciliation_duration = Histogram::with_opts(
        HistogramOpts::new(
            "groupsync_reconciliation_duration_seconds",
            "Duration of GroupSync reconciliations in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
    )?;
    let groups_synced_total = IntCounterVec::new(
        Opts::new(
            "groupsync_groups_synced_total",
            "Total number of Groups created or updated",
        ),
        &["provider"],
    )?;

    registry.register(Box::new(reconciliations_total.clone()))?;
    registry.register(Box::new(reconciliation_duration.clone()))?;
    registry.register(Box::new(groups_synced_total.clone()))?;

    Ok(Arc::new(ControllerMetrics {
        registry,
        reconciliations_total,
        reconciliation_duration,
        groups_synced_total,
    }))
}

impl ControllerMetrics {
    pub fn record_reconciliation_success(&self, duration_secs: f64) {
        self.reconciliations_total
            .with_label_values(&["success"])
            .inc();
        self.reconciliation_duration.observe(duration_secs);
    }

    pub fn record_reconciliation_error(&self, duration_secs: f64) {
        self.reconciliations_total.with_label_values(&["error"]).inc();
        self.reconciliation_duration.observe(duration_secs);
    }

    pub fn record_groups_synced(&self, provider: &str, count: usize) {
        self.groups_synced_total
            .with_label_values(&[provider])
            .inc_by(count as u64);
    }

    /// Render all metrics in the Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
