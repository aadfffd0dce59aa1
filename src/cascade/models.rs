use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::StoreError;
use crate::manifest::Strategy;


#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApplyError {
    #[error("Precondition failed: {0}")]
    Precondition(String),
    #[error("Store error on {id}: {source}")]
    Store {
        id: String,
        #[source]
        source: StoreError,
    },
}

impl ApplyError {
    pub fn store(id: &str, source: StoreError) -> Self {
        Self::Store {
            id: id.to_string(),
            source,
        }
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyOutcome {
    Applied,
    /// Already in the target state: a gone document, an existing sentinel,
    /// the same new owner, or a preserve decision.
    Unchanged,
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub table: String,
    pub field: String,
    pub id: String,
    pub error: String,
}


#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub processed: usize,
    pub changed: usize,
    pub files_deleted: usize,
    pub failures: Vec<ItemFailure>,
}

impl BatchOutcome {
    pub fn merge(&mut self, other: BatchOutcome) {
        self.processed += other.processed;
        self.changed += other.changed;
        self.files_deleted += other.files_deleted;
        self.failures.extend(other.failures);
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldReport {
    pub field: String,
    pub strategy: Strategy,
    pub matched: usize,
    pub processed: usize,
    pub changed: usize,
    pub failed: usize,
}


#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableReport {
    pub table: String,
    pub fields: Vec<FieldReport>,
    pub files_deleted: usize,
}

impl TableReport {
    fn count(&self, strategy: Strategy) -> usize {
        self.fields
            .iter()
            .filter(|f| f.strategy == strategy)
            .map(|f| f.changed)
            .sum()
    }
}

/// Aggregate result of one cascade run across every registered table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeReport {
    pub user_id: String,
    pub tables: Vec<TableReport>,
    pub failures: Vec<ItemFailure>,
}

impl CascadeReport {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            ..Default::default()
        }
    }

    pub fn tables_processed(&self) -> usize {
        self.tables.len()
    }

    pub fn records_deleted(&self) -> usize {
        self.tables.iter().map(|t| t.count(Strategy::Delete)).sum()
    }

    pub fn records_anonymized(&self) -> usize {
        self.tables.iter().map(|t| t.count(Strategy::Anonymize)).sum()
    }

    pub fn records_reassigned(&self) -> usize {
        self.tables.iter().map(|t| t.count(Strategy::Reassign)).sum()
    }

    pub fn records_preserved(&self) -> usize {
        self.tables
            .iter()
            .flat_map(|t| t.fields.iter())
            .filter(|f| f.strategy == Strategy::Preserve)
            .map(|f| f.processed)
            .sum()
    }

    pub fn files_deleted(&self) -> usize {
        self.tables.iter().map(|t| t.files_deleted).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}


#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CascadeError {
    #[error("Precondition failed for {table}.{field}: {message}")]
    Precondition {
        table: String,
        field: String,
        message: String,
    },
    #[error("Query on {table} via {index} failed: {source}")]
    Query {
        table: String,
        index: String,
        #[source]
        source: StoreError,
    },
    #[error("Cascade left {0} records unresolved")]
    Incomplete(usize),
}

/// A fatal cascade error together with whatever was applied before it.
#[derive(Debug, Error, Clone)]
#[error("{error}")]
pub struct CascadeFailure {
    pub error: CascadeError,
    pub partial: CascadeReport,
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub table: String,
    pub field: String,
    pub strategy: Strategy,
    pub records: usize,
    pub blobs: usize,
}

/// Dry-run view of what a cascade would touch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadePlan {
    pub user_id: String,
    pub entries: Vec<PlanEntry>,
}

impl CascadePlan {
    pub fn total_records(&self) -> usize {
        self.entries.iter().map(|e| e.records).sum()
    }

    pub fn total_blobs(&self) -> usize {
        self.entries.iter().map(|e| e.blobs).sum()
    }
}
