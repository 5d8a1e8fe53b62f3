//! Memoized node reachability
//!
//! One cache lives for one audit run. The map is guarded by an async mutex
//! that is held across the probe, so a node is probed at most once per run
//! even when callers race on the same name.

use crate::client::ResourceClient;
use crate::observability::{PodwatchMetrics, StructuredLogger};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

/// Node name -> reachable, populated lazily
pub struct ReachabilityCache {
    client: Arc<dyn ResourceClient>,
    results: Mutex<HashMap<String, bool>>,
    metrics: PodwatchMetrics,
    logger: StructuredLogger,
}

impl ReachabilityCache {
    pub fn new(client: Arc<dyn ResourceClient>, logger: StructuredLogger) -> Self {
        Self {
            client,
            results: Mutex::new(HashMap::new()),
            metrics: PodwatchMetrics::new(),
            logger,
        }
    }

    /// Cached reachability for `node`, probing on first use
    ///
    /// An unscheduled instance (empty node) is unreachable and never probed.
    /// A probe that cannot run counts as unreachable.
    pub async fn is_reachable(&self, node: &str) -> bool {
        if node.is_empty() {
            return false;
        }

        let mut results = self.results.lock().await;
        if let Some(reachable) = results.get(node) {
            return *reachable;
        }

        self.metrics.inc_probes_issued();
        let reachable = match self.client.probe_reachable(node).await {
            Ok(reachable) => reachable,
            Err(e) => {
                warn!(node = %node, error = %e, "Probe failed to run, treating node as unreachable");
                false
            }
        };
        if !reachable {
            self.metrics.inc_nodes_unreachable();
        }
        self.logger.log_probe(node, reachable);

        results.insert(node.to_string(), reachable);
        reachable
    }

    /// Copy of every result gathered so far
    pub async fn snapshot(&self) -> HashMap<String, bool> {
        self.results.lock().await.clone()
    }
}
