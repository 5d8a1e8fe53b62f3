//! Command handlers

pub mod audit;
pub mod logs;

use anyhow::{Context, Result};
use podwatch_lib::normalizer;
use podwatch_lib::{AuditError, ClusterScope, InstanceRecord, NameFilter, ResourceClient, ResourceKind};

/// List pods and keep the ones matching the name filter
///
/// An empty match is fatal for both commands.
pub async fn list_matched(
    client: &dyn ResourceClient,
    scope: &ClusterScope,
    filter: &NameFilter,
) -> Result<Vec<InstanceRecord>> {
    let raw = client
        .list_instances(ResourceKind::Pod, scope)
        .await
        .context("Failed to list pods")?;

    let records = normalizer::normalize(&raw, filter).context("Failed to parse pod listing")?;

    if records.is_empty() {
        return Err(anyhow::Error::new(AuditError::EmptyResult)
            .context(format!("Nothing to do for '{}'", filter.needle)));
    }
    Ok(records)
}

/// Label used to tag log events with the scope in use
pub fn scope_label(scope: &ClusterScope) -> String {
    match (&scope.context, &scope.namespace) {
        (Some(ctx), Some(ns)) => format!("{}/{}", ctx, ns),
        (None, Some(ns)) => ns.clone(),
        (Some(ctx), None) => format!("{}/default", ctx),
        (None, None) => "default".to_string(),
    }
}
