//! Observability infrastructure for audits and log aggregation
//!
//! Provides:
//! - Prometheus counters (probes, streamed lines, worker outcomes)
//! - Structured logging of lifecycle events with tracing

use prometheus::{register_int_counter, IntCounter};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<PodwatchMetricsInner> = OnceLock::new();

struct PodwatchMetricsInner {
    probes_issued: IntCounter,
    nodes_unreachable: IntCounter,
    lines_streamed: IntCounter,
    error_lines: IntCounter,
    workers_completed: IntCounter,
    workers_failed: IntCounter,
}

impl PodwatchMetricsInner {
    fn new() -> Self {
        Self {
            probes_issued: register_int_counter!(
                "podwatch_reachability_probes_total",
                "Reachability probes actually issued (cache misses)"
            )
            .expect("Failed to register probes_issued"),

            nodes_unreachable: register_int_counter!(
                "podwatch_nodes_unreachable_total",
                "Nodes whose probe reported them unreachable"
            )
            .expect("Failed to register nodes_unreachable"),

            lines_streamed: register_int_counter!(
                "podwatch_log_lines_total",
                "Log lines received across all workers"
            )
            .expect("Failed to register lines_streamed"),

            error_lines: register_int_counter!(
                "podwatch_error_lines_total",
                "Log lines matching the error pattern"
            )
            .expect("Failed to register error_lines"),

            workers_completed: register_int_counter!(
                "podwatch_workers_completed_total",
                "Log workers whose stream ended normally"
            )
            .expect("Failed to register workers_completed"),

            workers_failed: register_int_counter!(
                "podwatch_workers_failed_total",
                "Log workers whose stream failed"
            )
            .expect("Failed to register workers_failed"),
        }
    }
}

/// Handle to the process-wide podwatch metrics
///
/// Multiple clones share the same underlying counters.
#[derive(Clone)]
pub struct PodwatchMetrics {
    _private: (),
}

impl Default for PodwatchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PodwatchMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(PodwatchMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &PodwatchMetricsInner {
        GLOBAL_METRICS.get_or_init(PodwatchMetricsInner::new)
    }

    pub fn inc_probes_issued(&self) {
        self.inner().probes_issued.inc();
    }

    pub fn inc_nodes_unreachable(&self) {
        self.inner().nodes_unreachable.inc();
    }

    pub fn inc_lines_streamed(&self) {
        self.inner().lines_streamed.inc();
    }

    pub fn inc_error_lines(&self) {
        self.inner().error_lines.inc();
    }

    pub fn inc_workers_completed(&self) {
        self.inner().workers_completed.inc();
    }

    pub fn inc_workers_failed(&self) {
        self.inner().workers_failed.inc();
    }

    pub fn probes_issued(&self) -> u64 {
        self.inner().probes_issued.get()
    }

    pub fn lines_streamed(&self) -> u64 {
        self.inner().lines_streamed.get()
    }
}

/// Structured logger for audit and aggregation events
#[derive(Clone)]
pub struct StructuredLogger {
    scope: String,
}

impl StructuredLogger {
    /// Create a logger tagged with the namespace (or other scope) in use
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
        }
    }

    pub fn log_audit_started(&self, matched: usize) {
        info!(
            event = "audit_started",
            scope = %self.scope,
            matched = matched,
            "Auditing matched pods"
        );
    }

    pub fn log_instance_verdict(&self, instance: &str, node: &str, healthy: bool, reason: &str) {
        if healthy {
            debug!(
                event = "instance_audited",
                scope = %self.scope,
                instance = %instance,
                node = %node,
                health = "good",
                "Pod is healthy"
            );
        } else {
            info!(
                event = "instance_audited",
                scope = %self.scope,
                instance = %instance,
                node = %node,
                health = "bad",
                reason = %reason,
                "Pod is unhealthy"
            );
        }
    }

    pub fn log_audit_finished(&self, total: usize, ready_percentage: f64, reachable_nodes: usize) {
        info!(
            event = "audit_finished",
            scope = %self.scope,
            total = total,
            ready_percentage = ready_percentage,
            reachable_nodes = reachable_nodes,
            "Audit complete"
        );
    }

    pub fn log_probe(&self, node: &str, reachable: bool) {
        if reachable {
            debug!(event = "node_probed", node = %node, reachable = true, "Node reachable");
        } else {
            warn!(event = "node_probed", node = %node, reachable = false, "Node unreachable");
        }
    }

    pub fn log_worker_started(&self, instance: &str, follow: bool) {
        debug!(
            event = "worker_started",
            scope = %self.scope,
            instance = %instance,
            follow = follow,
            "Streaming logs"
        );
    }

    pub fn log_worker_completed(&self, instance: &str, lines: usize) {
        info!(
            event = "worker_completed",
            scope = %self.scope,
            instance = %instance,
            lines = lines,
            "Log stream ended"
        );
    }

    pub fn log_worker_failed(&self, instance: &str, error: &str) {
        warn!(
            event = "worker_failed",
            scope = %self.scope,
            instance = %instance,
            error = %error,
            "Log stream failed"
        );
    }

    pub fn log_flush_failed(&self, instance: &str, path: &str, error: &str) {
        warn!(
            event = "flush_failed",
            scope = %self.scope,
            instance = %instance,
            path = %path,
            error = %error,
            "Failed to persist log buffer"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "shutdown",
            scope = %self.scope,
            reason = %reason,
            "Stopping log workers"
        );
    }
}
