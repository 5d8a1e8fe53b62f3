//! Resource client contract and its `kubectl`-backed implementation
//!
//! The core never talks to the cluster directly. It consumes a
//! [`ResourceClient`], which lists instances as templated text, opens live
//! line streams for an instance's logs and probes node reachability.

use crate::error::{ClientError, ProbeError, StreamError};
use crate::models::{ClusterScope, LogRequest, ResourceKind};
use async_trait::async_trait;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tracing::{debug, warn};

/// Live, line-oriented stream of one instance's log output
pub type LineStream = Pin<Box<dyn Stream<Item = std::io::Result<String>> + Send>>;

/// Go template fragments rendering the normalizer's columns, in order
///
/// The status column follows `kubectl get pods`: a container's waiting or
/// terminated reason (`CrashLoopBackOff`, `OOMKilled`) wins over the pod
/// phase.
pub const LISTING_COLUMNS: [&str; 6] = [
    "{{.metadata.name}}",
    concat!(
        "{{$status := .status.phase}}",
        "{{range .status.containerStatuses}}",
        "{{with .state.waiting}}{{with .reason}}{{$status = .}}{{end}}{{end}}",
        "{{with .state.terminated}}{{with .reason}}{{$status = .}}{{end}}{{end}}",
        "{{end}}{{$status}}"
    ),
    "{{.spec.nodeName}}",
    "{{range .status.containerStatuses}}{{.restartCount}}+{{end}}",
    "{{range .status.containerStatuses}}{{with .lastState.terminated}}{{.message}}{{end}}{{end}}",
    "{{.metadata.creationTimestamp}}",
];

/// Go template rendering one pod per line
pub fn listing_template() -> String {
    format!("{{{{range .items}}}}{}{{{{\"\\n\"}}}}{{{{end}}}}", LISTING_COLUMNS.join(","))
}

/// Default timeout for a single reachability probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Lines buffered between a log process and its worker
const LINE_CHANNEL_CAPACITY: usize = 256;

/// Cluster access used by the auditor and the aggregator
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// List instances of `kind` as raw templated text
    async fn list_instances(
        &self,
        kind: ResourceKind,
        scope: &ClusterScope,
    ) -> Result<String, ClientError>;

    /// Open a live line stream for one instance
    async fn stream_logs(
        &self,
        scope: &ClusterScope,
        request: &LogRequest,
    ) -> Result<LineStream, StreamError>;

    /// Issue a single reachability probe against a node
    async fn probe_reachable(&self, node: &str) -> Result<bool, ProbeError>;
}

/// Build the scope flags shared by every kubectl call
fn scope_args(scope: &ClusterScope) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(ns) = &scope.namespace {
        args.push("-n".to_string());
        args.push(ns.clone());
    }
    if let Some(ctx) = &scope.context {
        args.push("--context".to_string());
        args.push(ctx.clone());
    }
    args
}

/// Arguments for listing instances of a kind
pub fn list_args(kind: ResourceKind, scope: &ClusterScope) -> Vec<String> {
    let mut args = vec!["get".to_string(), kind.as_str().to_string()];
    args.extend(scope_args(scope));
    args.push("-o".to_string());
    args.push(format!("go-template={}", listing_template()));
    args
}

/// Arguments for streaming one instance's logs
pub fn log_args(scope: &ClusterScope, request: &LogRequest) -> Vec<String> {
    let mut args = vec!["logs".to_string(), request.selector.clone()];
    args.extend(scope_args(scope));
    args.push(format!("--tail={}", request.tail_lines));
    if request.follow {
        args.push("-f".to_string());
    }
    args
}

/// Arguments for a single ICMP echo with a bounded wait
pub fn probe_args(node: &str, timeout: Duration) -> Vec<String> {
    vec![
        "-c".to_string(),
        "1".to_string(),
        "-W".to_string(),
        timeout.as_secs().max(1).to_string(),
        node.to_string(),
    ]
}

/// One raw output line without its terminator, invalid UTF-8 replaced
pub fn decode_line(raw: &[u8]) -> String {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}

/// Resource client backed by the `kubectl` and `ping` executables
#[derive(Debug, Clone)]
pub struct KubectlClient {
    kubectl: String,
    ping: String,
    probe_timeout: Duration,
}

impl Default for KubectlClient {
    fn default() -> Self {
        Self::new("kubectl")
    }
}

impl KubectlClient {
    /// Create a client using the given kubectl executable
    pub fn new(kubectl: impl Into<String>) -> Self {
        Self {
            kubectl: kubectl.into(),
            ping: "ping".to_string(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Override the ping executable
    pub fn with_ping(mut self, ping: impl Into<String>) -> Self {
        self.ping = ping.into();
        self
    }

    /// Override the probe timeout
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }
}

#[async_trait]
impl ResourceClient for KubectlClient {
    async fn list_instances(
        &self,
        kind: ResourceKind,
        scope: &ClusterScope,
    ) -> Result<String, ClientError> {
        let args = list_args(kind, scope);
        debug!(program = %self.kubectl, kind = kind.as_str(), "Listing instances");

        let output = Command::new(&self.kubectl)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| ClientError::Spawn {
                program: self.kubectl.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ClientError::CommandFailed {
                program: self.kubectl.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn stream_logs(
        &self,
        scope: &ClusterScope,
        request: &LogRequest,
    ) -> Result<LineStream, StreamError> {
        let instance = request.selector.clone();
        let mut child = Command::new(&self.kubectl)
            .args(log_args(scope, request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| StreamError::Open {
                instance: instance.clone(),
                reason: e.to_string(),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| StreamError::Open {
            instance: instance.clone(),
            reason: "log process has no stdout".to_string(),
        })?;
        let stderr = child.stderr.take();

        let (tx, rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            // Drain stderr concurrently so a chatty process never blocks on it
            let stderr_task = tokio::spawn(async move {
                let mut buf = String::new();
                if let Some(mut stderr) = stderr {
                    let _ = stderr.read_to_string(&mut buf).await;
                }
                buf
            });

            // Log output is bytes, not guaranteed UTF-8
            let mut reader = BufReader::new(stdout);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => break,
                    Ok(_) => {
                        if tx.send(Ok(decode_line(&buf))).await.is_err() {
                            // Receiver dropped: the worker is gone, stop the process
                            let _ = child.kill().await;
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        let _ = child.kill().await;
                        return;
                    }
                }
            }

            let stderr_text = stderr_task.await.unwrap_or_default();
            match child.wait().await {
                Ok(status) if status.success() => {}
                Ok(status) => {
                    warn!(instance = %instance, %status, "Log process exited unsuccessfully");
                    let message = format!("log process exited with {}: {}", status, stderr_text.trim());
                    let _ = tx.send(Err(std::io::Error::other(message))).await;
                }
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    async fn probe_reachable(&self, node: &str) -> Result<bool, ProbeError> {
        let probe = Command::new(&self.ping)
            .args(probe_args(node, self.probe_timeout))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        // ping's own -W bounds the wait; this guards against it hanging on DNS
        let deadline = self.probe_timeout + Duration::from_secs(1);
        match tokio::time::timeout(deadline, probe).await {
            Ok(Ok(status)) => Ok(status.success()),
            Ok(Err(e)) => Err(ProbeError {
                node: node.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => {
                debug!(node = %node, "Reachability probe timed out");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    fn scoped() -> ClusterScope {
        ClusterScope {
            namespace: Some("payments".to_string()),
            context: Some("staging".to_string()),
        }
    }

    #[test]
    fn test_list_args() {
        let args = list_args(ResourceKind::Pod, &scoped());
        assert_eq!(&args[..6], ["get", "pods", "-n", "payments", "--context", "staging"]);
        assert_eq!(args[6], "-o");
        assert!(args[7].starts_with("go-template={{range .items}}"));
    }

    #[test]
    fn test_log_args_follow() {
        let request = LogRequest {
            selector: "api-1".to_string(),
            tail_lines: 50,
            follow: true,
        };
        let args = log_args(&ClusterScope::default(), &request);
        assert_eq!(args, ["logs", "api-1", "--tail=50", "-f"]);
    }

    #[test]
    fn test_log_args_no_follow() {
        let request = LogRequest {
            selector: "api-1".to_string(),
            tail_lines: 10,
            follow: false,
        };
        let args = log_args(&scoped(), &request);
        assert_eq!(
            args,
            ["logs", "api-1", "-n", "payments", "--context", "staging", "--tail=10"]
        );
    }

    #[test]
    fn test_probe_args_never_zero_timeout() {
        let args = probe_args("node1", Duration::from_millis(200));
        assert_eq!(args, ["-c", "1", "-W", "1", "node1"]);
    }

    #[test]
    fn test_template_column_count() {
        assert_eq!(LISTING_COLUMNS.len(), crate::normalizer::COLUMN_COUNT);
        let template = listing_template();
        assert!(template.starts_with("{{range .items}}{{.metadata.name}},"));
        assert!(template.ends_with("{{.metadata.creationTimestamp}}{{\"\\n\"}}{{end}}"));
    }

    #[test]
    fn test_status_column_prefers_container_reason() {
        let status = LISTING_COLUMNS[1];
        assert!(status.starts_with("{{$status := .status.phase}}"));
        assert!(status.contains("{{with .state.waiting}}{{with .reason}}{{$status = .}}"));
        assert!(status.contains("{{with .state.terminated}}{{with .reason}}{{$status = .}}"));
        assert!(status.ends_with("{{end}}{{$status}}"));
        assert!(!status.contains(','));
    }

    #[test]
    fn test_decode_line() {
        assert_eq!(decode_line(b"plain\n"), "plain");
        assert_eq!(decode_line(b"windows\r\n"), "windows");
        assert_eq!(decode_line(b"no terminator"), "no terminator");
        assert_eq!(decode_line(b"caf\xe9 crash\n"), "caf\u{FFFD} crash");
    }

    #[tokio::test]
    async fn test_probe_error_when_program_missing() {
        let client = KubectlClient::default().with_ping("definitely-not-a-ping-binary");
        let result = client.probe_reachable("node1").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_stream_open_fails_when_program_missing() {
        let client = KubectlClient::new("definitely-not-kubectl");
        let request = LogRequest {
            selector: "api-1".to_string(),
            tail_lines: 10,
            follow: false,
        };
        let result = client.stream_logs(&ClusterScope::default(), &request).await;
        assert!(matches!(result, Err(StreamError::Open { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stream_reads_process_output() {
        // `echo` ignores the kubectl arguments and prints them back as one line
        let client = KubectlClient::new("echo");
        let request = LogRequest {
            selector: "api-1".to_string(),
            tail_lines: 5,
            follow: false,
        };
        let mut stream = client
            .stream_logs(&ClusterScope::default(), &request)
            .await
            .unwrap();

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first, "logs api-1 --tail=5");
        assert!(stream.next().await.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stream_survives_invalid_utf8() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("kubectl");
        std::fs::write(
            &script,
            "#!/bin/sh\nprintf 'first line\\n'\nprintf 'latin1 caf\\351 crash\\n'\nprintf 'third line\\r\\n'\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let client = KubectlClient::new(script.to_string_lossy());
        let request = LogRequest {
            selector: "pod-a".to_string(),
            tail_lines: 10,
            follow: false,
        };
        let stream = client
            .stream_logs(&ClusterScope::default(), &request)
            .await
            .unwrap();

        let lines: Vec<String> = stream.map(|line| line.unwrap()).collect().await;
        assert_eq!(
            lines,
            ["first line", "latin1 caf\u{FFFD} crash", "third line"]
        );
    }
}
