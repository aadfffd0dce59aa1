use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

use super::models::ExternalOutcome;
use crate::cascade::CascadeReport;


#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Audit write failed: {0}")]
    Write(String),
    #[error("Audit I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Audit serialization error: {0}")]
    Json(#[from] serde_json::Error),
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuditStatus {
    Completed,
    CompletedWithWarnings,
    CascadeFailed,
}


#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeSummary {
    pub tables_processed: usize,
    pub records_deleted: usize,
    pub records_anonymized: usize,
    pub records_reassigned: usize,
    pub files_deleted: usize,
    pub failed_items: usize,
}

impl From<&CascadeReport> for CascadeSummary {
    fn from(report: &CascadeReport) -> Self {
        Self {
            tables_processed: report.tables_processed(),
            records_deleted: report.records_deleted(),
            records_anonymized: report.records_anonymized(),
            records_reassigned: report.records_reassigned(),
            files_deleted: report.files_deleted(),
            failed_items: report.failures.len(),
        }
    }
}

/// One immutable row of the deletion audit trail. Carries identifiers only,
/// never the deleted user's personal data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub deletion_id: Uuid,
    pub actor_id: String,
    pub target_user_id: String,
    pub external_handle: Option<String>,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
    pub status: AuditStatus,
    pub cascade: CascadeSummary,
    pub external: ExternalOutcome,
    pub error: Option<String>,
}


#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), AuditError>;
}


#[derive(Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<AuditLogEntry>>,
    failing: AtomicBool,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditLogEntry> {
        self.entries.lock().clone()
    }

    pub fn entries_for(&self, target_user_id: &str) -> Vec<AuditLogEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.target_user_id == target_user_id)
            .cloned()
            .collect()
    }

    /// Makes every subsequent append fail, to simulate an unavailable sink.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl AuditSink for MemoryAuditLog {
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), AuditError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AuditError::Write("audit sink unavailable".to_string()));
        }
        self.entries.lock().push(entry.clone());
        Ok(())
    }
}

/// Append-only JSON Lines file. Existing lines are never rewritten.
pub struct JsonlAuditLog {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl JsonlAuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        info!("Audit log at {}", path.display());
        Self {
            path,
            lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read_all(&self) -> Result<Vec<AuditLogEntry>, AuditError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(AuditError::from))
            .collect()
    }
}

#[async_trait]
impl AuditSink for JsonlAuditLog {
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), AuditError> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let _guard = self.lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!("Appended audit entry {} for {}", entry.id, entry.target_user_id);
        Ok(())
    }
}
