//! Error taxonomy for audits and log aggregation
//!
//! Only [`StreamError`] is contained locally (per worker). Everything else
//! propagates to the top-level invocation and ends it.

use thiserror::Error;

/// Malformed record text returned by the resource client
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed record on line {line_number}: {reason} (line: {line:?})")]
pub struct ParseError {
    /// 1-based line number within the raw listing
    pub line_number: usize,
    /// The offending line, verbatim
    pub line: String,
    pub reason: String,
}

impl ParseError {
    pub fn new(line_number: usize, line: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            line_number,
            line: line.into(),
            reason: reason.into(),
        }
    }
}

/// Failures of a health audit
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuditError {
    /// No instances survived the name filter
    #[error("no pods matched the given name")]
    EmptyResult,
}

/// A single worker's log stream could not be opened or read
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("failed to open log stream for {instance}: {reason}")]
    Open { instance: String, reason: String },

    #[error("log stream for {instance} failed: {source}")]
    Read {
        instance: String,
        #[source]
        source: std::io::Error,
    },

    #[error("worker for {instance} aborted: {reason}")]
    Aborted { instance: String, reason: String },
}

impl StreamError {
    /// Name of the instance whose stream failed
    pub fn instance(&self) -> &str {
        match self {
            StreamError::Open { instance, .. }
            | StreamError::Read { instance, .. }
            | StreamError::Aborted { instance, .. } => instance,
        }
    }
}

/// The reachability probe could not be executed at all
#[derive(Debug, Error)]
#[error("reachability probe for node {node} could not run: {reason}")]
pub struct ProbeError {
    pub node: String,
    pub reason: String,
}

/// Failures talking to the cluster through the resource client
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),
}
