//! Per-instance persisted log buffers
//!
//! Each buffer grows in memory and is rewritten in full after every line.
//! The rewrite goes through a temporary file and a rename, so the file on
//! disk always holds the last completed flush.

use chrono::{Local, NaiveDate};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Where persisted buffers are written
#[derive(Debug, Clone)]
pub struct PersistConfig {
    pub dir: PathBuf,
    pub date: NaiveDate,
}

impl PersistConfig {
    /// Persist into `dir`, stamping files with today's local date
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            date: Local::now().date_naive(),
        }
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    /// `<dir>/<instance>-date-<MM-DD-YYYY>.log`
    pub fn path_for(&self, instance: &str) -> PathBuf {
        self.dir
            .join(format!("{}-date-{}.log", instance, self.date.format("%m-%d-%Y")))
    }
}

/// Accumulated output of one instance, owned by its single worker
#[derive(Debug)]
pub struct PersistedLogBuffer {
    path: PathBuf,
    content: String,
}

impl PersistedLogBuffer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            content: String::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Append one line and rewrite the backing file
    ///
    /// The in-memory buffer keeps the line even if the flush fails.
    pub async fn append(&mut self, line: &str) -> std::io::Result<()> {
        self.content.push_str(line);
        self.content.push('\n');
        self.flush().await
    }

    async fn flush(&self) -> std::io::Result<()> {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, self.content.as_bytes()).await?;
        fs::rename(&tmp, &self.path).await
    }
}
