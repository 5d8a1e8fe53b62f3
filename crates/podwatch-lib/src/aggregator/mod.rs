//! Concurrent log aggregation
//!
//! One worker per matched instance. Without follow the workers run one after
//! another and their captured text is returned. With follow every worker is
//! spawned at once into a [`WorkerGroup`] that is handed back immediately;
//! the group joins the workers and owns the single cancellation signal.

mod persist;
mod registry;
mod worker;


pub use persist::{PersistConfig, PersistedLogBuffer};
pub use registry::{WorkerRegistry, WorkerState};
pub use worker::WorkerOutcome;

use crate::client::ResourceClient;
use crate::error::StreamError;
use crate::matcher::ErrorMatcher;
use crate::models::ClusterScope;
use crate::observability::{PodwatchMetrics, StructuredLogger};
use crate::sink::LineSink;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use worker::{Worker, WorkerContext};

/// Default number of trailing lines requested per instance
pub const DEFAULT_TAIL_LINES: u32 = 100;

/// Settings for one aggregation run
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub tail_lines: u32,
    pub follow: bool,
    /// Persist each instance's output when set
    pub persist: Option<PersistConfig>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            tail_lines: DEFAULT_TAIL_LINES,
            follow: false,
            persist: None,
        }
    }
}

/// Result of [`LogAggregator::aggregate`]
pub enum Aggregation {
    /// Non-follow mode: every worker has finished
    Captured(Vec<WorkerOutcome>),
    /// Follow mode: workers are running
    Following(WorkerGroup),
}

/// Fans log streams out to one worker per instance
pub struct LogAggregator {
    ctx: Arc<WorkerContext>,
}

impl LogAggregator {
    pub fn new(
        client: Arc<dyn ResourceClient>,
        scope: ClusterScope,
        matcher: ErrorMatcher,
        sink: Arc<dyn LineSink>,
        config: AggregatorConfig,
        logger: StructuredLogger,
    ) -> Self {
        let ctx = WorkerContext {
            client,
            scope,
            matcher: Arc::new(matcher),
            sink,
            persist: config.persist,
            registry: WorkerRegistry::new(),
            logger,
            metrics: PodwatchMetrics::new(),
            tail_lines: config.tail_lines,
            follow: config.follow,
        };
        Self { ctx: Arc::new(ctx) }
    }

    pub fn registry(&self) -> &WorkerRegistry {
        &self.ctx.registry
    }

    /// Run in the mode selected by the configuration
    pub async fn aggregate(&self, instances: &[String]) -> Aggregation {
        if self.ctx.follow {
            Aggregation::Following(self.launch(instances))
        } else {
            Aggregation::Captured(self.run_sequential(instances).await)
        }
    }

    /// Stream each instance to completion, one at a time
    pub async fn run_sequential(&self, instances: &[String]) -> Vec<WorkerOutcome> {
        let mut outcomes = Vec::with_capacity(instances.len());
        for instance in instances {
            let worker = Worker::new(self.ctx.clone(), instance.as_str(), true);
            outcomes.push(worker.run(None).await);
        }
        debug!(workers = outcomes.len(), "Sequential log capture finished");
        outcomes
    }

    /// Spawn one concurrent worker per instance and return at once
    pub fn launch(&self, instances: &[String]) -> WorkerGroup {
        let (shutdown_tx, _) = broadcast::channel(1);

        let handles = instances
            .iter()
            .map(|instance| {
                let worker = Worker::new(self.ctx.clone(), instance.as_str(), false);
                let shutdown = shutdown_tx.subscribe();
                (instance.clone(), tokio::spawn(worker.run(Some(shutdown))))
            })
            .collect();

        info!(workers = instances.len(), "Launched log workers");
        WorkerGroup {
            handles,
            shutdown: ShutdownHandle { tx: shutdown_tx },
            registry: self.ctx.registry.clone(),
            logger: self.ctx.logger.clone(),
        }
    }
}

/// Broadcasts the group's single cancellation signal
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: broadcast::Sender<()>,
}

impl ShutdownHandle {
    /// Ask every outstanding worker to stop
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

/// Supervised set of running log workers
///
/// Dropping the group without waiting stops its workers.
pub struct WorkerGroup {
    handles: Vec<(String, JoinHandle<WorkerOutcome>)>,
    shutdown: ShutdownHandle,
    registry: WorkerRegistry,
    logger: StructuredLogger,
}

impl WorkerGroup {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }

    /// Handle that can cancel the group while [`WorkerGroup::wait`] runs
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn shutdown(&self, reason: &str) {
        self.logger.log_shutdown(reason);
        self.shutdown.trigger();
    }

    /// Join every worker and collect its outcome, in launch order
    pub async fn wait(self) -> Vec<WorkerOutcome> {
        let mut outcomes = Vec::with_capacity(self.handles.len());
        for (instance, handle) in self.handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    let error = StreamError::Aborted {
                        instance: instance.clone(),
                        reason: e.to_string(),
                    };
                    self.registry.set(&instance, WorkerState::Failed);
                    self.logger.log_worker_failed(&instance, &error.to_string());
                    WorkerOutcome::failed(instance, error.to_string())
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }
}
