use async_trait::async_trait;
use thiserror::Error;

use super::record::{Patch, Record};


#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Write rejected: {0}")]
    Rejected(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Document store the cascade runs against. Every write is a single atomic
/// operation on one document.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn get(&self, table: &str, id: &str) -> Result<Option<Record>, StoreError>;

    async fn patch(&self, table: &str, id: &str, patch: Patch) -> Result<(), StoreError>;

    async fn delete(&self, table: &str, id: &str) -> Result<(), StoreError>;

    
    async fn query_by_index(
        &self,
        table: &str,
        index: &str,
        key: &str,
    ) -> Result<Vec<Record>, StoreError>;

    async fn delete_blob(&self, blob_id: &str) -> Result<(), StoreError>;
}
