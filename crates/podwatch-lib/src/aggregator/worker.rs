//! A single instance's log worker
//!
//! `Idle -> Streaming -> {Completed | Failed}`, or `Cancelled` when the
//! group's shutdown signal fires. A failure is reported against the
//! worker's own instance and never touches its siblings.

use super::persist::{PersistConfig, PersistedLogBuffer};
use super::registry::{WorkerRegistry, WorkerState};
use crate::client::ResourceClient;
use crate::error::StreamError;
use crate::matcher::ErrorMatcher;
use crate::models::{ClusterScope, LogRequest};
use crate::observability::{PodwatchMetrics, StructuredLogger};
use crate::sink::LineSink;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::StreamExt;

/// Everything a worker needs, shared by all workers of one run
pub(crate) struct WorkerContext {
    pub client: Arc<dyn ResourceClient>,
    pub scope: ClusterScope,
    pub matcher: Arc<ErrorMatcher>,
    pub sink: Arc<dyn LineSink>,
    pub persist: Option<PersistConfig>,
    pub registry: WorkerRegistry,
    pub logger: StructuredLogger,
    pub metrics: PodwatchMetrics,
    pub tail_lines: u32,
    pub follow: bool,
}

/// Final report of one worker
#[derive(Debug, Clone)]
pub struct WorkerOutcome {
    pub instance: String,
    pub state: WorkerState,
    pub lines: usize,
    /// Raw text received, one line per `\n`; empty unless capture was requested
    pub captured: String,
    pub error: Option<String>,
}

impl WorkerOutcome {
    pub(crate) fn failed(instance: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            state: WorkerState::Failed,
            lines: 0,
            captured: String::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.state == WorkerState::Failed
    }
}

pub(crate) struct Worker {
    ctx: Arc<WorkerContext>,
    instance: String,
    capture: bool,
    lines: usize,
    captured: String,
    buffer: Option<PersistedLogBuffer>,
}

impl Worker {
    pub fn new(ctx: Arc<WorkerContext>, instance: impl Into<String>, capture: bool) -> Self {
        let instance = instance.into();
        let buffer = ctx
            .persist
            .as_ref()
            .map(|p| PersistedLogBuffer::new(p.path_for(&instance)));
        ctx.registry.set(&instance, WorkerState::Idle);
        Self {
            ctx,
            instance,
            capture,
            lines: 0,
            captured: String::new(),
            buffer,
        }
    }

    /// Stream until the source ends, fails, or `shutdown` fires
    pub async fn run(mut self, shutdown: Option<broadcast::Receiver<()>>) -> WorkerOutcome {
        let cancelled = async move {
            match shutdown {
                Some(mut rx) => {
                    let _ = rx.recv().await;
                }
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(cancelled);

        let request = LogRequest {
            selector: self.instance.clone(),
            tail_lines: self.ctx.tail_lines,
            follow: self.ctx.follow,
        };

        let ctx = self.ctx.clone();
        let opened = tokio::select! {
            biased;
            _ = &mut cancelled => return self.finish(WorkerState::Cancelled, None),
            opened = ctx.client.stream_logs(&ctx.scope, &request) => opened,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => return self.finish(WorkerState::Failed, Some(e)),
        };

        self.ctx.registry.set(&self.instance, WorkerState::Streaming);
        self.ctx.logger.log_worker_started(&self.instance, self.ctx.follow);

        loop {
            let next = tokio::select! {
                biased;
                _ = &mut cancelled => return self.finish(WorkerState::Cancelled, None),
                next = stream.next() => next,
            };

            match next {
                Some(Ok(line)) => self.handle_line(&line).await,
                Some(Err(source)) => {
                    let error = StreamError::Read {
                        instance: self.instance.clone(),
                        source,
                    };
                    return self.finish(WorkerState::Failed, Some(error));
                }
                None => return self.finish(WorkerState::Completed, None),
            }
        }
    }

    async fn handle_line(&mut self, line: &str) {
        self.lines += 1;
        self.ctx.metrics.inc_lines_streamed();

        let inspected = self.ctx.matcher.inspect(&self.instance, line);
        if inspected.matched_error_span.is_some() {
            self.ctx.metrics.inc_error_lines();
        }
        self.ctx
            .sink
            .emit(&self.instance, &self.ctx.matcher.annotate_inspected(&inspected));

        if self.capture {
            self.captured.push_str(line);
            self.captured.push('\n');
        }

        if let Some(buffer) = self.buffer.as_mut() {
            if let Err(e) = buffer.append(line).await {
                self.ctx.logger.log_flush_failed(
                    &self.instance,
                    &buffer.path().display().to_string(),
                    &e.to_string(),
                );
            }
        }
    }

    fn finish(self, state: WorkerState, error: Option<StreamError>) -> WorkerOutcome {
        self.ctx.registry.set(&self.instance, state);
        match (&state, &error) {
            (WorkerState::Failed, Some(e)) => {
                self.ctx.metrics.inc_workers_failed();
                self.ctx.logger.log_worker_failed(&self.instance, &e.to_string());
            }
            (WorkerState::Completed, _) => {
                self.ctx.metrics.inc_workers_completed();
                self.ctx.logger.log_worker_completed(&self.instance, self.lines);
            }
            _ => {}
        }

        WorkerOutcome {
            instance: self.instance,
            state,
            lines: self.lines,
            captured: self.captured,
            error: error.map(|e| e.to_string()),
        }
    }
}
