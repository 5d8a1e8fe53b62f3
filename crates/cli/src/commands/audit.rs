//! Pod health audit command

use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use podwatch_lib::auditor::{AuditConfig, AuditReport, HealthAuditor};
use podwatch_lib::sink::render_table;
use podwatch_lib::{ClusterScope, NameFilter, ReachabilityCache, ResourceClient, StructuredLogger};
use std::sync::Arc;
use tabled::Tabled;

use super::{list_matched, scope_label};
use crate::output::{
    color_age, color_health, color_reachable, color_readiness, color_restarts, color_status,
    format_age, print_success, print_warning, truncate, OutputFormat,
};

#[derive(Tabled)]
struct AuditRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "Restarts")]
    restarts: String,
    #[tabled(rename = "Age")]
    age: String,
    #[tabled(rename = "Node Reachable")]
    reachable: String,
    #[tabled(rename = "Health")]
    health: String,
    #[tabled(rename = "Last Termination")]
    last_termination: String,
}

const MESSAGE_WIDTH: usize = 48;

/// Audit every pod whose name matches the filter
pub async fn run_audit(
    client: Arc<dyn ResourceClient>,
    scope: ClusterScope,
    filter: NameFilter,
    config: AuditConfig,
    format: OutputFormat,
) -> Result<()> {
    let records = list_matched(client.as_ref(), &scope, &filter).await?;

    let logger = StructuredLogger::new(scope_label(&scope));
    let cache = ReachabilityCache::new(client, logger.clone());
    let auditor = HealthAuditor::new(&cache, config, logger);
    let report = auditor.audit_instances(&records, Utc::now()).await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report)?;
            println!("{}", json);
        }
        OutputFormat::Table => print_report(&report, auditor.config()),
    }

    Ok(())
}

fn print_report(report: &AuditReport, config: &AuditConfig) {
    let rows: Vec<AuditRow> = report
        .instances
        .iter()
        .map(|audit| {
            let record = &audit.record;
            AuditRow {
                name: record.name.clone(),
                status: color_status(&record.status, audit.status_flag),
                node: if record.node.is_empty() {
                    "-".to_string()
                } else {
                    record.node.clone()
                },
                restarts: color_restarts(record.restart_count, audit.restart_flag),
                age: color_age(&format_age(audit.age()), audit.age_flag),
                reachable: color_reachable(audit.node_reachable),
                health: color_health(audit.health),
                last_termination: truncate(&record.terminated_message, MESSAGE_WIDTH),
            }
        })
        .collect();

    println!("{}", render_table(&rows));
    println!();

    println!("{}", "Summary".bold());
    println!("{}", "-".repeat(50));
    println!(
        "Ready:                  {}",
        color_readiness(report.ready_percentage, report.readiness)
    );
    println!("Pods:                   {}", report.total_instances);
    println!(
        "Nodes reachable:        {}/{}",
        report.reachable_node_count, report.total_nodes_seen
    );
    println!();

    let unhealthy: Vec<_> = report.unhealthy().collect();
    if unhealthy.is_empty() {
        print_success("All matched pods are healthy");
    } else {
        for audit in unhealthy {
            print_warning(&format!(
                "{} is unhealthy: {}",
                audit.record.name,
                audit.reasons(config.max_pod_age).join(", ")
            ));
        }
    }
}
