//! Concurrent log streaming command

use anyhow::{Context, Result};
use podwatch_lib::aggregator::{Aggregation, AggregatorConfig, LogAggregator, PersistConfig};
use podwatch_lib::{
    ClusterScope, ErrorMatcher, NameFilter, ResourceClient, StdoutSink, StructuredLogger,
    WorkerOutcome, WorkerState,
};
use std::path::PathBuf;
use std::sync::Arc;

use super::{list_matched, scope_label};
use crate::output::{print_info, print_success, print_warning};

/// Options recognised by the logs command
#[derive(Debug, Clone)]
pub struct LogsOptions {
    pub tail_lines: u32,
    pub follow: bool,
    pub highlight: bool,
    pub regex: Option<String>,
    /// Persist per-pod output into this directory when set
    pub save_dir: Option<PathBuf>,
}

/// Stream logs from every pod whose name matches the filter
pub async fn run_logs(
    client: Arc<dyn ResourceClient>,
    scope: ClusterScope,
    filter: NameFilter,
    options: LogsOptions,
) -> Result<()> {
    let matcher = ErrorMatcher::from_options(options.highlight, options.regex.as_deref())
        .context("Invalid --regex pattern")?;

    let records = list_matched(client.as_ref(), &scope, &filter).await?;
    let instances: Vec<String> = records.into_iter().map(|r| r.name).collect();

    let persist = match &options.save_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            Some(PersistConfig::new(dir.clone()))
        }
        None => None,
    };

    let logger = StructuredLogger::new(scope_label(&scope));
    let aggregator = LogAggregator::new(
        client,
        scope,
        matcher,
        Arc::new(StdoutSink),
        AggregatorConfig {
            tail_lines: options.tail_lines,
            follow: options.follow,
            persist: persist.clone(),
        },
        logger.clone(),
    );

    let outcomes = match aggregator.aggregate(&instances).await {
        Aggregation::Captured(outcomes) => outcomes,
        Aggregation::Following(group) => {
            print_info(&format!(
                "Following logs from {} pods, press Ctrl-C to stop",
                group.len()
            ));

            let stop = group.shutdown_handle();
            let wait = group.wait();
            tokio::pin!(wait);

            tokio::select! {
                outcomes = &mut wait => outcomes,
                _ = tokio::signal::ctrl_c() => {
                    logger.log_shutdown("interrupt received");
                    stop.trigger();
                    let outcomes = wait.await;
                    println!();
                    print_success("Stopped following logs, goodbye!");
                    outcomes
                }
            }
        }
    };

    print_summary(&outcomes, persist.as_ref());
    Ok(())
}

fn print_summary(outcomes: &[WorkerOutcome], persist: Option<&PersistConfig>) {
    for outcome in outcomes {
        match outcome.state {
            WorkerState::Failed => print_warning(&format!(
                "{}: {}",
                outcome.instance,
                outcome.error.as_deref().unwrap_or("log stream failed")
            )),
            _ => {
                if let Some(persist) = persist {
                    if outcome.lines > 0 {
                        print_info(&format!(
                            "{}: saved to {}",
                            outcome.instance,
                            persist.path_for(&outcome.instance).display()
                        ));
                    }
                }
            }
        }
    }

    let total_lines: usize = outcomes.iter().map(|o| o.lines).sum();
    let failed = outcomes.iter().filter(|o| o.is_failed()).count();
    print_info(&format!(
        "{} lines from {} pods ({} failed)",
        total_lines,
        outcomes.len(),
        failed
    ));
}
