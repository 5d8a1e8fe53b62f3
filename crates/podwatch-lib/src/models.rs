//! Core data models shared by the auditor and the log aggregator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// One workload instance (pod) at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub name: String,
    pub status: String,
    /// Hosting node, empty when the pod is not scheduled yet
    pub node: String,
    /// Sum of restarts across all containers
    pub restart_count: u32,
    pub terminated_message: String,
    pub creation_timestamp: DateTime<Utc>,
}

impl InstanceRecord {
    /// Case-insensitive check for the `Running` status
    pub fn is_running(&self) -> bool {
        self.status.eq_ignore_ascii_case("running")
    }
}

/// Resource kinds understood by the resource client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResourceKind {
    #[default]
    Pod,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Pod => "pods",
        }
    }
}

/// Cluster scope every client call is issued against
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterScope {
    pub namespace: Option<String>,
    pub context: Option<String>,
}

/// Name-substring filter applied after a listing is parsed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameFilter {
    pub needle: String,
    /// Keep records that do NOT contain the needle
    pub inverse: bool,
}

impl NameFilter {
    pub fn new(needle: impl Into<String>, inverse: bool) -> Self {
        Self {
            needle: needle.into(),
            inverse,
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        name.contains(self.needle.as_str()) != self.inverse
    }
}

/// Typed options for a single log stream request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRequest {
    /// Instance name the stream is requested for
    pub selector: String,
    pub tail_lines: u32,
    pub follow: bool,
}

/// One line of output from one instance's stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub owner_instance: String,
    pub text: String,
    pub matched_error_span: Option<Range<usize>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_running_ignores_case() {
        let mut record = InstanceRecord {
            name: "pod-a".to_string(),
            status: "running".to_string(),
            node: "node1".to_string(),
            restart_count: 0,
            terminated_message: String::new(),
            creation_timestamp: Utc::now(),
        };
        assert!(record.is_running());

        record.status = "CrashLoopBackOff".to_string();
        assert!(!record.is_running());
    }

    #[test]
    fn test_name_filter() {
        let filter = NameFilter::new("api", false);
        assert!(filter.matches("api-7d9f"));
        assert!(!filter.matches("worker-1"));

        let inverse = NameFilter::new("api", true);
        assert!(!inverse.matches("api-7d9f"));
        assert!(inverse.matches("worker-1"));
    }
}
