use tracing::{debug, warn};

use super::models::ApplyError;
use crate::db::{DataStore, Record};

/// Deletes one blob, treating an already-missing blob as swept.
/// Returns whether a blob was actually removed.
pub async fn sweep_blob(store: &dyn DataStore, blob_id: &str) -> Result<bool, ApplyError> {
    match store.delete_blob(blob_id).await {
        Ok(()) => {
            debug!("Deleted blob {}", blob_id);
            Ok(true)
        }
        Err(e) if e.is_not_found() => {
            debug!("Blob {} already gone", blob_id);
            Ok(false)
        }
        Err(e) => {
            warn!("Failed to delete blob {}: {}", blob_id, e);
            Err(ApplyError::store(blob_id, e))
        }
    }
}

/// Blobs removed for one record and the fields they were referenced from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub files_deleted: usize,
    pub fields: Vec<String>,
}

/// Removes every blob that `record` references through `storage_fields`.
///
/// The record itself is not written. Callers that keep the document fold
/// `fields` into their own patch so the record sees a single write.
pub async fn sweep_record(
    store: &dyn DataStore,
    record: &Record,
    storage_fields: &[String],
) -> Result<SweepOutcome, ApplyError> {
    let mut outcome = SweepOutcome::default();

    for field in storage_fields {
        let blob_ids = record.blob_ids(field);
        if blob_ids.is_empty() {
            continue;
        }
        for blob_id in &blob_ids {
            if sweep_blob(store, blob_id).await? {
                outcome.files_deleted += 1;
            }
        }
        outcome.fields.push(field.clone());
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_sweep_blob_is_idempotent() {
        let store = MemoryStore::new();
        store.put_blob("blob_1");

        assert_eq!(sweep_blob(&store, "blob_1").await, Ok(true));
        assert_eq!(sweep_blob(&store, "blob_1").await, Ok(false));
        assert!(!store.has_blob("blob_1"));
    }

    #[tokio::test]
    async fn test_sweep_record_reports_swept_fields() {
        let store = MemoryStore::new();
        store.put_blob("a");
        store.put_blob("b");
        let record = Record::new("e1")
            .with("userId", "u1")
            .with("attachmentIds", json!(["a", "b", "missing"]));
        store.insert("emails", record.clone());

        let fields = vec!["attachmentIds".to_string(), "bodyStorageId".to_string()];
        let outcome = sweep_record(&store, &record, &fields).await.unwrap();

        assert_eq!(outcome.files_deleted, 2);
        assert_eq!(outcome.fields, vec!["attachmentIds".to_string()]);
        assert!(!store.has_blob("a"));
        assert_eq!(store.record("emails", "e1").unwrap(), record);
    }

    #[tokio::test]
    async fn test_sweep_failure_is_reported() {
        let store = MemoryStore::new();
        store.put_blob("stuck");
        store.fail_writes_for("stuck");
        let record = Record::new("p1").with("avatarStorageId", "stuck");

        let err = sweep_record(&store, &record, &["avatarStorageId".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, ApplyError::Store { .. }));
    }
}
