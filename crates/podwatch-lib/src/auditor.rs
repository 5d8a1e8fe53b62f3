//! Health auditor
//!
//! Classifies each matched pod as Good or Bad from its status, restart count,
//! age and node reachability, and aggregates a cluster readiness report.

use crate::error::AuditError;
use crate::models::InstanceRecord;
use crate::observability::StructuredLogger;
use crate::reachability::ReachabilityCache;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Readiness above this percentage is presented as high
pub const HIGH_READINESS_THRESHOLD: f64 = 70.0;

/// Restart counts above this are flagged as high
pub const HIGH_RESTART_THRESHOLD: u32 = 2;

/// Restart counts above this contribute to a Bad verdict on old pods
pub const UNHEALTHY_RESTART_THRESHOLD: u32 = 1;

/// Default age beyond which restarting pods are considered unhealthy
pub const DEFAULT_MAX_POD_AGE_MINUTES: i64 = 60;

/// Health verdict for one instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Good,
    Bad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeFlag {
    OverThreshold,
    UnderThreshold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartFlag {
    High,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFlag {
    Running,
    NotRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessClass {
    HighReadiness,
    LowReadiness,
}

impl ReadinessClass {
    pub fn classify(ready_percentage: f64) -> Self {
        if ready_percentage > HIGH_READINESS_THRESHOLD {
            ReadinessClass::HighReadiness
        } else {
            ReadinessClass::LowReadiness
        }
    }
}

/// Auditor settings
#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub max_pod_age: Duration,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_pod_age: Duration::minutes(DEFAULT_MAX_POD_AGE_MINUTES),
        }
    }
}

impl AuditConfig {
    pub fn with_max_age_minutes(minutes: i64) -> Self {
        Self {
            max_pod_age: Duration::minutes(minutes.max(0)),
        }
    }
}

/// Verdict from the four health signals
///
/// Bad iff (restarts > 1 AND age > max age) OR node unreachable OR not running.
pub fn classify_health(
    restart_count: u32,
    age: Duration,
    max_pod_age: Duration,
    node_reachable: bool,
    running: bool,
) -> Health {
    let restarting_old_pod = restart_count > UNHEALTHY_RESTART_THRESHOLD && age > max_pod_age;
    if restarting_old_pod || !node_reachable || !running {
        Health::Bad
    } else {
        Health::Good
    }
}

/// Audit result for one instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceAudit {
    pub record: InstanceRecord,
    pub age_seconds: i64,
    pub node_reachable: bool,
    pub health: Health,
    pub age_flag: AgeFlag,
    pub restart_flag: RestartFlag,
    pub status_flag: StatusFlag,
}

impl InstanceAudit {
    pub fn age(&self) -> Duration {
        Duration::seconds(self.age_seconds)
    }

    /// Human readable list of the signals that made the verdict Bad
    pub fn reasons(&self, max_pod_age: Duration) -> Vec<&'static str> {
        let mut reasons = Vec::new();
        if self.status_flag == StatusFlag::NotRunning {
            reasons.push("not running");
        }
        if !self.node_reachable {
            reasons.push("node unreachable");
        }
        if self.record.restart_count > UNHEALTHY_RESTART_THRESHOLD && self.age() > max_pod_age {
            reasons.push("restarting past max age");
        }
        reasons
    }
}

/// Aggregate readiness over a matched set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub instances: Vec<InstanceAudit>,
    pub ready_percentage: f64,
    pub readiness: ReadinessClass,
    pub total_instances: usize,
    pub total_nodes_seen: usize,
    pub reachable_node_count: usize,
}

impl AuditReport {
    pub fn unhealthy(&self) -> impl Iterator<Item = &InstanceAudit> {
        self.instances.iter().filter(|a| a.health == Health::Bad)
    }
}

/// Percentage of running instances; fails on an empty set instead of yielding 0
pub fn ready_percentage(records: &[InstanceRecord]) -> Result<f64, AuditError> {
    if records.is_empty() {
        return Err(AuditError::EmptyResult);
    }
    let running = records.iter().filter(|r| r.is_running()).count();
    Ok(100.0 * running as f64 / records.len() as f64)
}

/// Audits instances sequentially against one reachability cache
pub struct HealthAuditor<'a> {
    cache: &'a ReachabilityCache,
    config: AuditConfig,
    logger: StructuredLogger,
}

impl<'a> HealthAuditor<'a> {
    pub fn new(cache: &'a ReachabilityCache, config: AuditConfig, logger: StructuredLogger) -> Self {
        Self {
            cache,
            config,
            logger,
        }
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Audit a frozen snapshot of records as of `now`
    pub async fn audit_instances(
        &self,
        records: &[InstanceRecord],
        now: DateTime<Utc>,
    ) -> Result<AuditReport, AuditError> {
        let ready_percentage = ready_percentage(records)?;
        self.logger.log_audit_started(records.len());

        let mut instances = Vec::with_capacity(records.len());
        for record in records {
            instances.push(self.audit_one(record, now).await);
        }

        let nodes: BTreeSet<&str> = records
            .iter()
            .map(|r| r.node.as_str())
            .filter(|n| !n.is_empty())
            .collect();
        // Every non-empty node was probed while auditing its instances
        let probed = self.cache.snapshot().await;
        let reachable_node_count = nodes
            .iter()
            .filter(|node| probed.get(**node).copied().unwrap_or(false))
            .count();

        let report = AuditReport {
            instances,
            ready_percentage,
            readiness: ReadinessClass::classify(ready_percentage),
            total_instances: records.len(),
            total_nodes_seen: nodes.len(),
            reachable_node_count,
        };
        self.logger.log_audit_finished(
            report.total_instances,
            report.ready_percentage,
            report.reachable_node_count,
        );
        Ok(report)
    }

    async fn audit_one(&self, record: &InstanceRecord, now: DateTime<Utc>) -> InstanceAudit {
        let age = (now - record.creation_timestamp).max(Duration::zero());
        let node_reachable = self.cache.is_reachable(&record.node).await;
        let running = record.is_running();

        let health = classify_health(
            record.restart_count,
            age,
            self.config.max_pod_age,
            node_reachable,
            running,
        );

        let audit = InstanceAudit {
            record: record.clone(),
            age_seconds: age.num_seconds(),
            node_reachable,
            health,
            age_flag: if age > self.config.max_pod_age {
                AgeFlag::OverThreshold
            } else {
                AgeFlag::UnderThreshold
            },
            restart_flag: if record.restart_count > HIGH_RESTART_THRESHOLD {
                RestartFlag::High
            } else {
                RestartFlag::Normal
            },
            status_flag: if running {
                StatusFlag::Running
            } else {
                StatusFlag::NotRunning
            },
        };

        let reasons = audit.reasons(self.config.max_pod_age).join(", ");
        self.logger
            .log_instance_verdict(&record.name, &record.node, health == Health::Good, &reasons);
        audit
    }
}
