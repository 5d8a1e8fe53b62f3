//! Pod health auditing and concurrent log aggregation
//!
//! This crate provides the core functionality for:
//! - Normalizing templated pod listings into typed records
//! - Auditing pod health with memoized node reachability probes
//! - Streaming logs from many pods at once with error highlighting
//! - Persisting per-pod log output

pub mod aggregator;
pub mod auditor;
pub mod client;
pub mod error;
pub mod matcher;
pub mod models;
pub mod normalizer;
pub mod observability;
pub mod reachability;
pub mod sink;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregator::{
    Aggregation, AggregatorConfig, LogAggregator, PersistConfig, WorkerGroup, WorkerOutcome,
    WorkerRegistry, WorkerState,
};
pub use auditor::{AuditConfig, AuditReport, Health, HealthAuditor, InstanceAudit};
pub use client::{KubectlClient, LineStream, ResourceClient};
pub use error::{AuditError, ClientError, ParseError, ProbeError, StreamError};
pub use matcher::ErrorMatcher;
pub use models::*;
pub use observability::{PodwatchMetrics, StructuredLogger};
pub use reachability::ReachabilityCache;
pub use sink::{LineSink, MemorySink, StdoutSink};
