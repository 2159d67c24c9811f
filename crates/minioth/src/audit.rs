//! Append-only JSON-lines audit trail of identity mutations and logins.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: String,
    pub action: String,
    pub actor: String,
    pub target: String,
    pub status: String,
    pub source_ip: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub details: String,
}

impl AuditEntry {
    pub fn new(action: &str, actor: &str, target: impl Into<String>) -> Self {
        Self {
            timestamp: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_default(),
            action: action.to_string(),
            actor: actor.to_string(),
            target: target.into(),
            status: "success".to_string(),
            source_ip: String::new(),
            details: String::new(),
        }
    }

    pub fn from_ip(mut self, ip: impl Into<String>) -> Self {
        self.source_ip = ip.into();
        self
    }

    /// Mark the entry failed with a reason.
    pub fn failed(mut self, reason: impl Into<String>) -> Self {
        self.status = "failure".to_string();
        self.details = reason.into();
        self
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    /// `success` or `failure` depending on an outcome.
    pub fn outcome<T, E: std::fmt::Display>(self, result: &Result<T, E>) -> Self {
        match result {
            Ok(_) => self,
            Err(e) => self.failed(e.to_string()),
        }
    }
}

#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    max_fetch: usize,
    write: Mutex<()>,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>, max_fetch: usize) -> Self {
        Self {
            path: path.into(),
            max_fetch: max_fetch.max(1),
            write: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry. Audit failures are logged, never surfaced.
    pub async fn record(&self, entry: AuditEntry) {
        if let Err(e) = self.append(&entry).await {
            tracing::error!("failed to write audit entry {:?}: {}", entry.action, e);
        }
    }

    async fn append(&self, entry: &AuditEntry) -> std::io::Result<()> {
        let mut line = serde_json::to_vec(entry).map_err(std::io::Error::other)?;
        line.push(b'\n');

        let _guard = self.write.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await
    }

    /// The latest `max` entries, oldest first, bounded by the configured cap.
    pub async fn tail(&self, max: Option<usize>) -> std::io::Result<Vec<AuditEntry>> {
        let limit = max.unwrap_or(self.max_fetch).clamp(1, self.max_fetch);
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let entries: Vec<AuditEntry> = text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect();
        let skip = entries.len().saturating_sub(limit);
        Ok(entries.into_iter().skip(skip).collect())
    }
}
