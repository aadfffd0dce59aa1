use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cascade::models::{ApplyError, ApplyOutcome};
use crate::db::{DataStore, Patch, Record};


pub const PREVIOUS_OWNER_FIELD: &str = "previousOwner";

pub const REASSIGNED_AT_FIELD: &str = "reassignedAt";

/// Hands the document over to `new_owner_id`, keeping the former value in
/// `previousOwner`. Choosing the new owner is the caller's business.
pub async fn reassign_record(
    store: &dyn DataStore,
    table: &str,
    field: &str,
    record: &Record,
    new_owner_id: Option<&str>,
) -> Result<ApplyOutcome, ApplyError> {
    let new_owner_id = new_owner_id.ok_or_else(|| {
        ApplyError::Precondition(format!(
            "reassigning {}.{} requires a new owner id",
            table, field
        ))
    })?;

    if record.references(field, new_owner_id) {
        debug!("{}/{} already owned by {}", table, record.id, new_owner_id);
        return Ok(ApplyOutcome::Unchanged);
    }

    let mut patch = Patch::new();
    patch.insert(field.to_string(), Value::String(new_owner_id.to_string()));
    patch.insert(
        PREVIOUS_OWNER_FIELD.to_string(),
        record.get(field).cloned().unwrap_or(Value::Null),
    );
    patch.insert(
        REASSIGNED_AT_FIELD.to_string(),
        Value::String(Utc::now().to_rfc3339()),
    );

    match store.patch(table, &record.id, patch).await {
        Ok(()) => {
            debug!("Reassigned {}.{} on {} to {}", table, field, record.id, new_owner_id);
            Ok(ApplyOutcome::Applied)
        }
        Err(e) if e.is_not_found() => {
            debug!("{}/{} vanished before reassignment", table, record.id);
            Ok(ApplyOutcome::Unchanged)
        }
        Err(e) => {
            warn!("Failed to reassign {}/{}: {}", table, record.id, e);
            Err(ApplyError::store(&record.id, e))
        }
    }
}
