//! Run history
//!
//! Appends one JSON line per finished run to `$STATE/relmatrix/history.log`.

use crate::config::{Config, ConfigManager};
use crate::matrix::RunResult;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// File-based history log of finished runs
pub struct RunHistory {
    enabled: bool,
    path: PathBuf,
}

impl RunHistory {
    pub fn new(config: &Config) -> Self {
        Self {
            enabled: config.general.history,
            path: ConfigManager::history_log_path(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a finished run
    pub async fn record_run(&self, result: &RunResult) {
        let jobs: Vec<serde_json::Value> = result
            .jobs
            .iter()
            .map(|report| {
                serde_json::json!({
                    "platform": report.job.id(),
                    "status": report.job.status(),
                    "cache_hit": report.job.cache_hit(),
                    "failure": report.job.failure().map(|f| f.kind),
                    "published": report.publish.as_ref().map(|p| p.is_published()),
                })
            })
            .collect();

        self.log(
            "run_finished",
            &serde_json::json!({
                "run_id": result.run_id,
                "matrix": result.matrix,
                "status": result.status,
                "jobs": jobs,
            }),
        )
        .await;
    }

    /// Append an event as a JSON line. IO failures are logged and dropped.
    pub async fn log(&self, event: &str, data: &serde_json::Value) {
        if !self.enabled {
            return;
        }

        let entry = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event": event,
            "data": data,
        });

        let mut line = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize history event: {}", e);
                return;
            }
        };
        line.push('\n');

        if let Err(e) = self.append(&line).await {
            warn!("Failed to write run history: {}", e);
        }
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Most recent entries, newest last
    pub async fn recent(&self, limit: usize) -> Vec<serde_json::Value> {
        let Ok(content) = tokio::fs::read_to_string(&self.path).await else {
            return Vec::new();
        };

        let entries: Vec<serde_json::Value> = content
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();
        let start = entries.len().saturating_sub(limit);
        entries[start..].to_vec()
    }
}
