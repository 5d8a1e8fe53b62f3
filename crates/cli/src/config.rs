//! Configuration management for the CLI
//!
//! Layers, lowest precedence first: built-in defaults, the config file,
//! `PODWATCH_*` environment variables. Command-line flags override all of
//! these in `main`.

use anyhow::{Context, Result};
use podwatch_lib::aggregator::DEFAULT_TAIL_LINES;
use podwatch_lib::auditor::DEFAULT_MAX_POD_AGE_MINUTES;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Default namespace
    #[serde(default)]
    pub namespace: Option<String>,
    /// Default kubeconfig context
    #[serde(default)]
    pub context: Option<String>,
    /// Age beyond which restarting pods are unhealthy
    #[serde(default = "default_max_pod_age")]
    pub max_pod_age_minutes: i64,
    /// Trailing lines requested per pod
    #[serde(default = "default_tail_lines")]
    pub tail_lines: u32,
    /// Directory for persisted logs
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// kubectl executable
    #[serde(default = "default_kubectl")]
    pub kubectl: String,
}

fn default_max_pod_age() -> i64 {
    DEFAULT_MAX_POD_AGE_MINUTES
}

fn default_tail_lines() -> u32 {
    DEFAULT_TAIL_LINES
}

fn default_log_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_kubectl() -> String {
    "kubectl".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: None,
            context: None,
            max_pod_age_minutes: default_max_pod_age(),
            tail_lines: default_tail_lines(),
            log_dir: default_log_dir(),
            kubectl: default_kubectl(),
        }
    }
}

impl Config {
    /// Load configuration from an explicit file, or the default location if present
    pub fn load(override_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        match override_path {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file {} does not exist", path.display());
                }
                builder = builder.add_source(config::File::from(path).required(true));
            }
            None => {
                if let Some(path) = Self::config_path() {
                    builder = builder.add_source(config::File::from(path).required(false));
                }
            }
        }

        let settings = builder
            .add_source(config::Environment::with_prefix("PODWATCH").try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        settings
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    /// Default configuration file path
    fn config_path() -> Option<PathBuf> {
        dirs_next::home_dir().map(|home| home.join(".config").join("podwatch").join("config.toml"))
    }
}
