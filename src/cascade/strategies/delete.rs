use tracing::{debug, warn};

use crate::cascade::models::{ApplyError, ApplyOutcome};
use crate::db::{DataStore, Record};

/// Removes `record` from `table`. A document that is already gone counts as
/// deleted.
pub async fn delete_record(
    store: &dyn DataStore,
    table: &str,
    record: &Record,
) -> Result<ApplyOutcome, ApplyError> {
    match store.delete(table, &record.id).await {
        Ok(()) => {
            debug!("Deleted {}/{}", table, record.id);
            Ok(ApplyOutcome::Applied)
        }
        Err(e) if e.is_not_found() => {
            debug!("{}/{} already gone, treating as deleted", table, record.id);
            Ok(ApplyOutcome::Unchanged)
        }
        Err(e) => {
            warn!("Failed to delete {}/{}: {}", table, record.id, e);
            Err(ApplyError::store(&record.id, e))
        }
    }
}
