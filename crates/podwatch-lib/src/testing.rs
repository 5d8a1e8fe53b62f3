//! Scripted in-memory resource client for tests

use crate::client::{LineStream, ResourceClient};
use crate::error::{ClientError, ProbeError, StreamError};
use crate::models::{ClusterScope, LogRequest, ResourceKind};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio_stream::StreamExt;

/// How the mock serves one instance's log stream
#[derive(Debug, Clone)]
pub enum StreamScript {
    /// Emit the lines, then end normally
    Lines(Vec<String>),
    /// Emit the lines with a pause before each one, then end normally
    Paced(Vec<String>, Duration),
    /// Refuse to open the stream
    FailOpen,
    /// Emit the lines, then yield a read error
    FailAfter(Vec<String>),
    /// Never produce anything and never end
    Hang,
}

pub struct MockClient {
    listing: String,
    nodes: HashMap<String, bool>,
    streams: HashMap<String, StreamScript>,
    probes: Mutex<HashMap<String, usize>>,
    requests: Mutex<Vec<LogRequest>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self {
            listing: String::new(),
            nodes: HashMap::new(),
            streams: HashMap::new(),
            probes: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_listing(mut self, listing: impl Into<String>) -> Self {
        self.listing = listing.into();
        self
    }

    pub fn with_node(mut self, node: &str, reachable: bool) -> Self {
        self.nodes.insert(node.to_string(), reachable);
        self
    }

    pub fn with_stream(mut self, instance: &str, script: StreamScript) -> Self {
        self.streams.insert(instance.to_string(), script);
        self
    }

    pub fn probe_count(&self, node: &str) -> usize {
        self.probes
            .lock()
            .unwrap()
            .get(node)
            .copied()
            .unwrap_or_default()
    }

    pub fn total_probes(&self) -> usize {
        self.probes.lock().unwrap().values().sum()
    }

    pub fn requests(&self) -> Vec<LogRequest> {
        self.requests.lock().unwrap().clone()
    }
}

pub fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[async_trait]
impl ResourceClient for MockClient {
    async fn list_instances(
        &self,
        _kind: ResourceKind,
        _scope: &ClusterScope,
    ) -> Result<String, ClientError> {
        Ok(self.listing.clone())
    }

    async fn stream_logs(
        &self,
        _scope: &ClusterScope,
        request: &LogRequest,
    ) -> Result<LineStream, StreamError> {
        self.requests.lock().unwrap().push(request.clone());
        let instance = request.selector.clone();

        let script = self.streams.get(&instance).cloned().unwrap_or(StreamScript::Lines(vec![]));
        let stream: LineStream = match script {
            StreamScript::Lines(items) => Box::pin(tokio_stream::iter(items.into_iter().map(Ok))),
            StreamScript::Paced(items, pause) => Box::pin(
                tokio_stream::iter(items.into_iter().map(Ok)).then(move |line| async move {
                    tokio::time::sleep(pause).await;
                    line
                }),
            ),
            StreamScript::FailOpen => {
                return Err(StreamError::Open {
                    instance,
                    reason: "pod not found".to_string(),
                })
            }
            StreamScript::FailAfter(items) => Box::pin(
                tokio_stream::iter(items.into_iter().map(Ok)).chain(tokio_stream::once(Err(
                    std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset"),
                ))),
            ),
            StreamScript::Hang => Box::pin(tokio_stream::pending()),
        };
        Ok(stream)
    }

    async fn probe_reachable(&self, node: &str) -> Result<bool, ProbeError> {
        *self
            .probes
            .lock()
            .unwrap()
            .entry(node.to_string())
            .or_default() += 1;

        self.nodes.get(node).copied().ok_or_else(|| ProbeError {
            node: node.to_string(),
            reason: "ping not available".to_string(),
        })
    }
}
