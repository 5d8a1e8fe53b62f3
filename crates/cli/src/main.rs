//! Podwatch CLI
//!
//! Audits the health of matched pods, or streams their logs concurrently
//! with error highlighting.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use commands::{audit, logs};
use podwatch_lib::auditor::AuditConfig;
use podwatch_lib::{ClusterScope, KubectlClient, NameFilter, ResourceClient};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Podwatch CLI
#[derive(Parser)]
#[command(name = "podwatch")]
#[command(author, version, about = "Audit pod health and stream pod logs", long_about = None)]
pub struct Cli {
    /// Path to a config file (defaults to ~/.config/podwatch/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose diagnostics on stderr
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Emit diagnostics as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Pod selection shared by every command
#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Substring of the pod names to match
    pub name: String,

    /// Namespace to search
    #[arg(long, short)]
    pub namespace: Option<String>,

    /// Match pods whose names do NOT contain the substring
    #[arg(long, short)]
    pub inverse: bool,

    /// Kubeconfig context to use
    #[arg(long, visible_alias = "ctx")]
    pub context: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Audit the health of matched pods
    Audit {
        #[command(flatten)]
        target: TargetArgs,

        /// Minutes after which a restarting pod is unhealthy
        #[arg(long, visible_alias = "ma")]
        max_age: Option<i64>,

        /// Output format
        #[arg(long, default_value = "table")]
        format: output::OutputFormat,
    },

    /// Stream logs from matched pods
    Logs {
        #[command(flatten)]
        target: TargetArgs,

        /// Number of trailing lines per pod
        #[arg(long, short)]
        lines: Option<u32>,

        /// Keep streaming new lines
        #[arg(long, short)]
        follow: bool,

        /// Highlight error lines
        #[arg(long, visible_alias = "hi")]
        highlight: bool,

        /// Custom highlight pattern, replaces the built-in keywords
        #[arg(long, visible_alias = "regx", requires = "highlight")]
        regex: Option<String>,

        /// Save each pod's output to <pod>-date-<MM-DD-YYYY>.log
        #[arg(long, short)]
        save: bool,
    },
}

impl TargetArgs {
    fn scope(&self, config: &config::Config) -> ClusterScope {
        ClusterScope {
            namespace: self.namespace.clone().or_else(|| config.namespace.clone()),
            context: self.context.clone().or_else(|| config.context.clone()),
        }
    }

    fn filter(&self) -> NameFilter {
        NameFilter::new(self.name.clone(), self.inverse)
    }
}

fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::Config::load(cli.config.as_deref())?;
    debug!(?config, "Configuration loaded");

    let client: Arc<dyn ResourceClient> = Arc::new(KubectlClient::new(config.kubectl.clone()));

    match cli.command {
        Commands::Audit {
            target,
            max_age,
            format,
        } => {
            let audit_config =
                AuditConfig::with_max_age_minutes(max_age.unwrap_or(config.max_pod_age_minutes));
            audit::run_audit(
                client,
                target.scope(&config),
                target.filter(),
                audit_config,
                format,
            )
            .await?;
        }
        Commands::Logs {
            target,
            lines,
            follow,
            highlight,
            regex,
            save,
        } => {
            let options = logs::LogsOptions {
                tail_lines: lines.unwrap_or(config.tail_lines),
                follow,
                highlight,
                regex,
                save_dir: save.then(|| config.log_dir.clone()),
            };
            logs::run_logs(client, target.scope(&config), target.filter(), options).await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_audit() {
        let cli = Cli::try_parse_from([
            "podwatch", "audit", "api", "-n", "payments", "-i", "--ctx", "staging", "--ma", "15",
        ])
        .unwrap();

        match cli.command {
            Commands::Audit {
                target, max_age, ..
            } => {
                assert_eq!(target.name, "api");
                assert!(target.inverse);
                assert_eq!(max_age, Some(15));

                let scope = target.scope(&config::Config::default());
                assert_eq!(scope.namespace.as_deref(), Some("payments"));
                assert_eq!(scope.context.as_deref(), Some("staging"));
            }
            _ => panic!("expected audit"),
        }
    }

    #[test]
    fn test_parse_logs() {
        let cli = Cli::try_parse_from([
            "podwatch", "logs", "worker", "-l", "20", "-f", "--hi", "--regx", "panic", "-s",
        ])
        .unwrap();

        match cli.command {
            Commands::Logs {
                target,
                lines,
                follow,
                highlight,
                regex,
                save,
            } => {
                assert_eq!(target.name, "worker");
                assert!(!target.inverse);
                assert_eq!(lines, Some(20));
                assert!(follow && highlight && save);
                assert_eq!(regex.as_deref(), Some("panic"));
            }
            _ => panic!("expected logs"),
        }
    }

    #[test]
    fn test_regex_requires_highlight() {
        let result = Cli::try_parse_from(["podwatch", "logs", "worker", "--regex", "panic"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_scope_falls_back_to_config() {
        let cli = Cli::try_parse_from(["podwatch", "audit", "api"]).unwrap();
        let config = config::Config {
            namespace: Some("from-config".to_string()),
            ..Default::default()
        };

        match cli.command {
            Commands::Audit { target, .. } => {
                let scope = target.scope(&config);
                assert_eq!(scope.namespace.as_deref(), Some("from-config"));
                assert!(scope.context.is_none());
            }
            _ => panic!("expected audit"),
        }
    }
}
